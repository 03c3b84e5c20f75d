use serde::{Deserialize, Serialize};

/// Paginated response wrapper returned by the remote API.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<SourceRecord>>,
}

/// One record as delivered on the wire.
///
/// Every field is optional; validity is decided by the mapper
/// (`interaction_id` is the business identity).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    #[serde(rename = "id")]
    pub remote_id: Option<i64>,
    #[serde(rename = "empresa")]
    pub company: Option<String>,
    #[serde(rename = "campaña")]
    pub campaign: Option<String>,
    #[serde(rename = "base")]
    pub base_segment: Option<String>,
    #[serde(rename = "estrategia")]
    pub strategy: Option<String>,
    #[serde(rename = "tipo_canal")]
    pub channel_type: Option<String>,
    #[serde(rename = "tipo_marcacion")]
    pub dial_type: Option<String>,
    #[serde(rename = "codigo_contacto")]
    pub contact_code: Option<String>,
    #[serde(rename = "contacto")]
    pub contact: Option<String>,
    #[serde(rename = "fecha_de_creacion_del_contacto")]
    pub contact_created_at: Option<String>,
    #[serde(rename = "fecha_ultima_de_actualizacion_del_contacto")]
    pub contact_updated_at: Option<String>,
    #[serde(rename = "codigo_producto")]
    pub product_code: Option<String>,
    #[serde(rename = "telefono_de_contacto")]
    pub phone: Option<String>,
    #[serde(rename = "grupo")]
    pub contact_group: Option<String>,
    #[serde(rename = "codigo_de_grupo")]
    pub group_code: Option<String>,
    #[serde(rename = "resultado")]
    pub result: Option<String>,
    #[serde(rename = "codigo_de_resultado")]
    pub result_code: Option<String>,
    #[serde(rename = "motivo")]
    pub reason: Option<String>,
    #[serde(rename = "codigo_de_motivo")]
    pub reason_code: Option<String>,
    #[serde(rename = "submotivo")]
    pub sub_reason: Option<String>,
    #[serde(rename = "codigo_de_submotivo")]
    pub sub_reason_code: Option<String>,
    #[serde(rename = "comentario_en_tipificacion")]
    pub classification_comment: Option<String>,
    #[serde(rename = "resultado_atk")]
    pub atk_result: Option<String>,
    #[serde(rename = "zip_code")]
    pub zip_code: Option<String>,
    #[serde(rename = "fecha_de_asignacion_de_ticket")]
    pub ticket_assigned_at: Option<String>,
    #[serde(rename = "fecha_de_tipificacion")]
    pub classified_at: Option<String>,
    #[serde(rename = "fecha_de_resolucion_de_ticket")]
    pub ticket_resolved_at: Option<String>,
    #[serde(rename = "fecha_pdp")]
    pub promise_date: Option<String>,
    #[serde(rename = "monto_pdp")]
    pub promise_amount: Option<f64>,
    #[serde(rename = "fecha_agenda")]
    pub scheduled_for: Option<String>,
    #[serde(rename = "id_usuario")]
    pub agent_id: Option<i64>,
    #[serde(rename = "usuario_gestion")]
    pub agent_name: Option<String>,
    #[serde(rename = "anexo")]
    pub agent_extension: Option<String>,
    #[serde(rename = "id_gestion")]
    pub interaction_id: Option<i64>,
    #[serde(rename = "id_llamada")]
    pub call_id: Option<String>,
    #[serde(rename = "id_ticket")]
    pub ticket_id: Option<i64>,
    #[serde(rename = "fecha_sincronizacion")]
    pub synced_at: Option<String>,
}
