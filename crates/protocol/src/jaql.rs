use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cell/element data type as reported by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Text,
    Numeric,
    Datetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// The panel a header/element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PanelType {
    Rows,
    Columns,
    Measures,
    Scope,
}

/// One JAQL panel element: a dimension, or a measure when `formula`/`agg`
/// is present. Open-ended JAQL fragments (`dim`, `filter`) stay raw.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaqlElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<Datatype>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panel: Option<PanelType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl JaqlElement {
    /// An element with a formula or aggregation is a measure; anything else
    /// is a category/dimension element.
    pub fn is_measure(&self) -> bool {
        self.formula.is_some() || self.agg.is_some()
    }

    pub fn title_or_dim(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.dim.clone())
            .unwrap_or_default()
    }
}

/// The request payload sent to start (or paginate) one query session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JaqlQuery {
    pub datasource: String,
    pub metadata: Vec<JaqlElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ungroup: Option<bool>,
    pub query_guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortingSettingsItem>>,
}

/// Per-column sort state, round-tripped between the sorting UI contract and
/// the `sort` field of the next query payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortingSettingsItem {
    pub title: String,
    pub datatype: Datatype,
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SortDirection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn measure_classification_follows_formula_and_agg() {
        let category = JaqlElement {
            title: Some("Country".into()),
            dim: Some("[Country.Country]".into()),
            ..Default::default()
        };
        assert!(!category.is_measure());

        let formula = JaqlElement {
            formula: Some("sum([Revenue])".into()),
            ..Default::default()
        };
        assert!(formula.is_measure());

        let agg = JaqlElement {
            dim: Some("[Commerce.Revenue]".into()),
            agg: Some("sum".into()),
            ..Default::default()
        };
        assert!(agg.is_measure());
    }

    #[test]
    fn query_payload_keeps_wire_casing_and_drops_empty_fields() {
        let query = JaqlQuery {
            datasource: "Sample ECommerce".into(),
            metadata: vec![JaqlElement {
                title: Some("Country".into()),
                dim: Some("[Country.Country]".into()),
                panel: Some(PanelType::Rows),
                ..Default::default()
            }],
            count: Some(50),
            offset: None,
            ungroup: None,
            query_guid: "g-9".into(),
            sort: None,
        };

        let wire = serde_json::to_value(&query).expect("serialize query");
        assert_eq!(
            wire,
            json!({
                "datasource": "Sample ECommerce",
                "metadata": [
                    { "title": "Country", "dim": "[Country.Country]", "panel": "rows" }
                ],
                "count": 50,
                "queryGuid": "g-9"
            })
        );
    }

    #[test]
    fn sort_settings_serialize_direction() {
        let item = SortingSettingsItem {
            title: "Revenue".into(),
            datatype: Datatype::Numeric,
            selected: true,
            direction: Some(SortDirection::Desc),
        };
        let wire = serde_json::to_value(&item).expect("serialize item");
        assert_eq!(wire.get("direction"), Some(&json!("desc")));
    }
}
