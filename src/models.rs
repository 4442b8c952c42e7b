use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::errors::ConsultationError;

// ============ Domain Models ============

/// Commercial-strategy profile returned for a client or an archetype.
///
/// Only built by the normalizer, which guarantees all five fields are non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// Narrative description of the client segment.
    pub archetype_and_profile: String,
    /// Suggested communication angle.
    pub message: String,
    /// Value-proposition statement.
    pub idea: String,
    /// Recommended contact channel.
    pub channel: String,
    /// Closing sales recommendation.
    pub recommendation: String,
}

/// Sales strategy returned for an archetype/product pair (`opcion` "3").
///
/// Field names follow the upstream document so the dashboard renders it as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeStrategy {
    #[serde(rename = "match_producto_perfil")]
    pub product_match: ProductMatch,
    #[serde(rename = "estrategia_comunicacion")]
    pub communication: CommunicationStrategy,
    #[serde(rename = "kit_ventas")]
    pub sales_kit: SalesKit,
    #[serde(rename = "manejo_resistencias")]
    pub objection_handling: ObjectionHandling,
}

/// How well the product fits the archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
    /// Affinity score out of 10.
    #[serde(rename = "score_afinidad")]
    pub affinity_score: f64,
    #[serde(rename = "analisis_viabilidad")]
    pub viability_analysis: String,
    #[serde(rename = "angulo_venta")]
    pub sales_angle: String,
}

/// Channel, timing and tone for the first contact.
///
/// The service names either a single channel or a list of suggested ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationStrategy {
    #[serde(rename = "canal_recomendado", default, skip_serializing_if = "Option::is_none")]
    pub recommended_channel: Option<String>,
    #[serde(rename = "canales_sugeridos", default, skip_serializing_if = "Option::is_none")]
    pub suggested_channels: Option<Vec<String>>,
    #[serde(rename = "justificacion_canal", default, skip_serializing_if = "Option::is_none")]
    pub channel_rationale: Option<String>,
    #[serde(rename = "justificacion_medios", default, skip_serializing_if = "Option::is_none")]
    pub media_rationale: Option<String>,
    #[serde(rename = "mejor_momento")]
    pub best_time: String,
    #[serde(rename = "tono_voz")]
    pub tone_of_voice: String,
}

impl CommunicationStrategy {
    /// True when at least one channel is named.
    pub fn has_channel(&self) -> bool {
        let single = self
            .recommended_channel
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        let listed = self
            .suggested_channels
            .as_ref()
            .is_some_and(|list| list.iter().any(|c| !c.trim().is_empty()));
        single || listed
    }
}

/// Ready-to-use sales copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesKit {
    /// WhatsApp message or e-mail subject line.
    #[serde(rename = "mensaje_whatsapp_o_asunto")]
    pub opening_message: String,
    #[serde(rename = "argumento_apertura")]
    pub opening_argument: String,
    #[serde(rename = "argumento_cierre")]
    pub closing_argument: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionHandling {
    #[serde(rename = "posible_objecion")]
    pub likely_objection: String,
    #[serde(rename = "respuesta_inteligente")]
    pub response: String,
}

/// What an archetype consultation produced.
///
/// The live service answers with a full [`ArchetypeStrategy`]; older flows
/// still answer with the five-field [`ProfileRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArchetypeReport {
    Strategy(ArchetypeStrategy),
    Profile(ProfileRecord),
}

/// Archetypes the upstream service knows how to profile.
pub const ARCHETYPES: [&str; 5] = [
    "Aportante promedio con perfil financiero moderado",
    "Aportante vulnerable con alta carga crediticia",
    "Aportante consolidado con alta estabilidad y bajo riesgo",
    "Profesional joven con desempeño financiero estable",
    "Aportante de bajos ingresos y limitada capacidad de ahorro",
];

/// Returns true when `name` is one of [`ARCHETYPES`].
pub fn is_known_archetype(name: &str) -> bool {
    ARCHETYPES.contains(&name)
}

// ============ Request Models ============

/// Consult-by-identifier input (`opcion` "1").
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConsultQuery {
    /// Client national ID number.
    #[serde(default)]
    pub cedula: String,
    /// Product the salesperson wants to offer.
    #[serde(default)]
    pub producto: String,
}

impl ConsultQuery {
    pub fn new(cedula: impl Into<String>, producto: impl Into<String>) -> Self {
        Self {
            cedula: cedula.into(),
            producto: producto.into(),
        }
    }

    /// Checks both fields and returns a trimmed copy.
    pub fn validated(&self) -> Result<Self, ConsultationError> {
        let cedula = self.cedula.trim();
        let producto = self.producto.trim();
        if cedula.is_empty() || producto.is_empty() {
            return Err(ConsultationError::Validation(
                "Please enter the client's ID number and the product.".to_string(),
            ));
        }
        Ok(Self::new(cedula, producto))
    }
}

/// Consult-by-archetype input (`opcion` "3").
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ArchetypeQuery {
    /// One of [`ARCHETYPES`].
    #[serde(default)]
    pub arquetipo: String,
    #[serde(default)]
    pub producto: String,
}

impl ArchetypeQuery {
    pub fn new(arquetipo: impl Into<String>, producto: impl Into<String>) -> Self {
        Self {
            arquetipo: arquetipo.into(),
            producto: producto.into(),
        }
    }

    /// Checks both fields and returns a trimmed copy.
    pub fn validated(&self) -> Result<Self, ConsultationError> {
        let arquetipo = self.arquetipo.trim();
        let producto = self.producto.trim();
        if arquetipo.is_empty() || producto.is_empty() {
            return Err(ConsultationError::Validation(
                "Please select an archetype and enter a product.".to_string(),
            ));
        }
        if !is_known_archetype(arquetipo) {
            return Err(ConsultationError::Validation(format!(
                "Unknown archetype: {}",
                arquetipo
            )));
        }
        Ok(Self::new(arquetipo, producto))
    }
}

/// Spreadsheet of clients to be clustered (`opcion` "2").
#[derive(Debug, Clone)]
pub struct ClusterUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

const SPREADSHEET_CONTENT_TYPES: [&str; 3] = [
    "text/csv",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

impl ClusterUpload {
    /// Accepts CSV and Excel files, judged by content type or extension.
    pub fn validate(&self) -> Result<(), ConsultationError> {
        if self.file_name.trim().is_empty() || self.bytes.is_empty() {
            return Err(ConsultationError::Validation(
                "Please select a file to upload.".to_string(),
            ));
        }

        let known_type = self
            .content_type
            .as_deref()
            .map(|ct| SPREADSHEET_CONTENT_TYPES.contains(&ct))
            .unwrap_or(false);

        if !known_type && !has_spreadsheet_extension(&self.file_name) {
            return Err(ConsultationError::Validation(
                "Invalid format. Please select a CSV or XLSX file.".to_string(),
            ));
        }

        Ok(())
    }

    /// MIME type sent upstream for the `file` part.
    pub fn mime(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or("application/octet-stream")
    }
}

fn spreadsheet_extension() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)\.(csv|xlsx|xls)$").ok())
        .as_ref()
}

fn has_spreadsheet_extension(file_name: &str) -> bool {
    spreadsheet_extension().is_some_and(|re| re.is_match(file_name.trim()))
}

// ============ Response Models ============

/// Which backend mode produced a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    Client,
    Archetype,
}

/// Echo of the query that produced a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEcho {
    pub mode: ConsultationMode,
    pub producto: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cedula: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arquetipo: Option<String>,
}

impl From<&ConsultQuery> for QueryEcho {
    fn from(query: &ConsultQuery) -> Self {
        Self {
            mode: ConsultationMode::Client,
            producto: query.producto.trim().to_string(),
            cedula: Some(query.cedula.trim().to_string()),
            arquetipo: None,
        }
    }
}

impl From<&ArchetypeQuery> for QueryEcho {
    fn from(query: &ArchetypeQuery) -> Self {
        Self {
            mode: ConsultationMode::Archetype,
            producto: query.producto.trim().to_string(),
            cedula: None,
            arquetipo: Some(query.arquetipo.trim().to_string()),
        }
    }
}

/// Body returned by the consultation endpoints on success.
///
/// `profile` is a [`ProfileRecord`] for client consultations and an
/// [`ArchetypeReport`] for archetype consultations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationResponse<T = ProfileRecord> {
    pub consultation_id: Uuid,
    pub profile: T,
    pub query: QueryEcho,
    pub completed_at: DateTime<Utc>,
}

/// Body returned by the cluster upload endpoint on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterResponse {
    pub success: bool,
    pub message: String,
}
