//! Document payloads accepted by the document creation endpoint.
//!
//! Field names are rendered in kebab-case and calendar dates as ISO-8601
//! (`YYYY-MM-DD`) strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A goods introduction document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub production_type: String,
    pub products: Vec<Product>,
    pub reg_date: NaiveDate,
    pub reg_number: String,
}

/// Participant description attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Description {
    pub participant_inn: String,
}

/// A single product entry within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Product {
    pub certificate_document: String,
    pub certificate_document_date: NaiveDate,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

impl Document {
    /// A fully populated sample document, used by the demo driver.
    pub fn sample() -> Self {
        let date =
            NaiveDate::from_ymd_opt(2020, 1, 23).expect("2020-01-23 is a valid calendar date");

        let product = Product {
            certificate_document: "certificate1".to_string(),
            certificate_document_date: date,
            certificate_document_number: "certNumber123".to_string(),
            owner_inn: "ownerInn123".to_string(),
            producer_inn: "procedureInn123".to_string(),
            production_date: date,
            tnved_code: "tnvedCode1".to_string(),
            uit_code: "uitCode1".to_string(),
            uitu_code: "uituCode1".to_string(),
        };

        Self {
            description: Description {
                participant_inn: "participantInn123".to_string(),
            },
            doc_id: "docId123".to_string(),
            doc_status: "status1".to_string(),
            doc_type: "LP_INTRODUCE_GOODS".to_string(),
            import_request: true,
            owner_inn: "onwerInn123".to_string(),
            participant_inn: "participantInn123".to_string(),
            producer_inn: "producerInn123".to_string(),
            production_date: date,
            production_type: "productionType1".to_string(),
            products: vec![product],
            reg_date: date,
            reg_number: "regNumber123".to_string(),
        }
    }
}
