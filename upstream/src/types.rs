//! Typed models for upstream payloads.
//!
//! Field names follow the wire contract of the backing services; unknown
//! fields are ignored on decode so catalog additions do not break the
//! gateway.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Genre {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Director {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

/// Summary shape shared by catalog listings, history, likes and the
/// personal list.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ContentSummary {
    pub id: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "fechaLanzamiento", default)]
    pub release_date: Option<String>,
    #[serde(rename = "idGenero", default)]
    pub genre_id: Option<String>,
    #[serde(rename = "valoracionPromedio", default)]
    pub average_rating: Option<f64>,
    #[serde(rename = "idSubtitulosContenido", default)]
    pub subtitle_group_id: Option<String>,
    #[serde(rename = "idDoblajeContenido", default)]
    pub dubbing_group_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "idioma", default)]
    pub language: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Registration {
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "idioma")]
    pub language: Option<String>,
    #[serde(rename = "idPlanSuscripcion")]
    pub plan_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(rename = "nombre")]
    pub name: String,
    pub password: String,
    pub email: String,
    #[serde(rename = "idioma")]
    pub language: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PaymentMethod {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "numeroTarjeta", default)]
    pub card_number: Option<String>,
    #[serde(rename = "emailPaypal", default)]
    pub paypal_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_summary_tolerates_sparse_payloads() {
        let summary: ContentSummary = serde_json::from_value(json!({
            "id": "c1",
            "titulo": "The Long Night",
            "campoDesconocido": true,
        }))
        .unwrap();

        assert_eq!(summary.title, "The Long Night");
        assert!(summary.genre_id.is_none());
        assert!(summary.average_rating.is_none());
    }

    #[test]
    fn test_registration_wire_names() {
        let registration = Registration {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
            language: None,
            plan_id: "plan-1".into(),
        };

        let value = serde_json::to_value(&registration).unwrap();
        assert_eq!(value["nombre"], "Ada");
        assert_eq!(value["idPlanSuscripcion"], "plan-1");
        assert_eq!(value["idioma"], serde_json::Value::Null);
    }
}
