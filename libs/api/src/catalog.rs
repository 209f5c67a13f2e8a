use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Catalog documents
// ════════════════════════════════════════════════════════════════
//
// Все поля опциональны: producer присылает частичные документы,
// отсутствующие поля не попадают в store. Неизвестные поля игнорируются.

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Vec<Price>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "SupportingLanguage", default, skip_serializing_if = "Option::is_none")]
    pub supporting_language: Option<Vec<SupportingLanguage>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<Tax>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pop_relationship: Option<Vec<PopRelationship>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<UnitOfMeasure>,
    #[serde(rename = "SupportingLanguage", default, skip_serializing_if = "Option::is_none")]
    pub supporting_language: Option<Vec<SupportingLanguage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PopRelationship {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "SupportingLanguage", default, skip_serializing_if = "Option::is_none")]
    pub supporting_language: Option<Vec<SupportingLanguage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Локализованное описание товара (topic `create.productsLanguage`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportingLanguage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<UnitOfMeasure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<Display>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Display {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_wire_names() {
        let json = r#"{
            "id": "p1",
            "name": "Chair",
            "stock": 3,
            "createdAt": "2024-01-01T00:00:00Z",
            "price": [{"id": "pr1", "unitOfMeasure": {"unit": "THB", "amount": 99.5, "currency": "฿"}}],
            "SupportingLanguage": [{"id": "l1", "languageCode": "th"}],
            "unexpected": true
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_deref(), Some("p1"));
        assert_eq!(product.stock, Some(3));
        assert_eq!(product.created_at.as_deref(), Some("2024-01-01T00:00:00Z"));
        let price = &product.price.as_ref().unwrap()[0];
        assert_eq!(price.unit_of_measure.as_ref().unwrap().amount, Some(99.5));
        let lang = &product.supporting_language.as_ref().unwrap()[0];
        assert_eq!(lang.language_code.as_deref(), Some("th"));

        let out = serde_json::to_value(&product).unwrap();
        assert!(out.get("SupportingLanguage").is_some());
        assert!(out.get("description").is_none());
        assert!(out.get("unexpected").is_none());
    }

    #[test]
    fn test_attachment_type_field() {
        let json = r#"{"id":"a1","type":"image","redirectUrl":"https://x","display":{"type":"banner","value":"top"}}"#;
        let attachment: Attachment = serde_json::from_str(json).unwrap();
        assert_eq!(attachment.kind.as_deref(), Some("image"));
        assert_eq!(attachment.redirect_url.as_deref(), Some("https://x"));
        assert_eq!(attachment.display.unwrap().kind.as_deref(), Some("banner"));
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        assert!(serde_json::from_str::<Product>(r#"{"stock":"many"}"#).is_err());
        assert!(serde_json::from_str::<Product>(r#"["not","an","object"]"#).is_err());
        assert!(serde_json::from_str::<SupportingLanguage>("not json").is_err());
    }
}
