use crate::error::{ProcessError, Result};
use crate::messages::{localized, UNSUPPORTED_DATETIME_LEVELS, UNSUPPORTED_FILTER};
use once_cell::sync::Lazy;
use pivot_protocol::{Datatype, JaqlElement, PanelType, SortDirection, SortingSettingsItem};
use std::collections::BTreeSet;

/// Datetime level groups whose members cannot be combined in one query.
static CONFLICTING_DATETIME_LEVELS: Lazy<Vec<BTreeSet<&'static str>>> = Lazy::new(|| {
    vec![BTreeSet::from([
        "Hours",
        "MinutesRoundTo30",
        "MinutesRoundTo15",
    ])]
});

/// Filter options the engine knows how to translate. Anything else fails
/// the session rather than degrading silently.
static SUPPORTED_FILTER_KEYS: Lazy<BTreeSet<&'static str>> = Lazy::new(|| {
    BTreeSet::from([
        "members", "exclude", "top", "bottom", "from", "to", "last", "next", "equals",
        "contains", "startsWith", "doesntContain", "all", "and", "or",
    ])
});

pub fn resolve_datatype(element: &JaqlElement) -> Datatype {
    element.datatype.unwrap_or(Datatype::Text)
}

/// Measures always live in the measures panel; everything else keeps its
/// declared panel, defaulting to rows.
pub fn element_panel(element: &JaqlElement) -> PanelType {
    if element.is_measure() {
        PanelType::Measures
    } else {
        element.panel.unwrap_or(PanelType::Rows)
    }
}

/// Default sort direction when the consumer selects a column without
/// choosing one: ascending for measures, descending otherwise.
pub fn default_direction(element: &JaqlElement) -> SortDirection {
    if element.is_measure() {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    }
}

/// Builds the sorting-settings descriptors for the consumer-facing sorting
/// UI contract from the query's elements.
pub fn sorting_settings(elements: &[JaqlElement]) -> Vec<SortingSettingsItem> {
    elements
        .iter()
        .filter(|e| e.title.is_some() || e.dim.is_some())
        .map(|e| SortingSettingsItem {
            title: e.title_or_dim(),
            datatype: resolve_datatype(e),
            selected: e.sort.is_some(),
            direction: e.sort,
        })
        .collect()
}

/// Rejects element combinations the engine cannot translate: conflicting
/// datetime levels and unknown filter options.
pub fn validate_elements(elements: &[JaqlElement]) -> Result<()> {
    let used_levels: BTreeSet<&str> = elements
        .iter()
        .filter_map(|e| e.level.as_deref())
        .collect();
    for group in CONFLICTING_DATETIME_LEVELS.iter() {
        let overlap: Vec<&str> = group
            .iter()
            .copied()
            .filter(|level| used_levels.contains(level))
            .collect();
        if overlap.len() >= 2 {
            return Err(ProcessError::UnsupportedJaqlShape(localized(
                UNSUPPORTED_DATETIME_LEVELS,
                &[("levels", &format!("{{{}}}", overlap.join(", ")))],
            )));
        }
    }

    for element in elements {
        let Some(filter) = element.filter.as_ref().and_then(|f| f.as_object()) else {
            continue;
        };
        for key in filter.keys() {
            if !SUPPORTED_FILTER_KEYS.contains(key.as_str()) {
                return Err(ProcessError::UnsupportedJaqlShape(localized(
                    UNSUPPORTED_FILTER,
                    &[("title", &element.title_or_dim()), ("key", key)],
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn datetime_element(level: &str) -> JaqlElement {
        JaqlElement {
            title: Some(format!("Date ({level})")),
            dim: Some("[Commerce.Date]".into()),
            datatype: Some(Datatype::Datetime),
            level: Some(level.into()),
            ..Default::default()
        }
    }

    #[test]
    fn conflicting_datetime_levels_are_rejected_with_a_readable_message() {
        let elements = vec![
            datetime_element("Hours"),
            datetime_element("MinutesRoundTo15"),
        ];
        let err = validate_elements(&elements).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Hours"), "message was: {message}");
        assert!(message.contains("MinutesRoundTo15"), "message was: {message}");
        assert!(message.contains("not supported"), "message was: {message}");
    }

    #[test]
    fn a_single_rounded_level_is_fine() {
        let elements = vec![datetime_element("MinutesRoundTo30")];
        assert!(validate_elements(&elements).is_ok());
    }

    #[test]
    fn unknown_filter_options_fail_the_validation() {
        let element = JaqlElement {
            title: Some("Country".into()),
            dim: Some("[Country.Country]".into()),
            filter: Some(json!({ "periodic": true })),
            ..Default::default()
        };
        let err = validate_elements(&[element]).unwrap_err();
        assert!(err.to_string().contains("periodic"));
    }

    #[test]
    fn member_filters_are_supported() {
        let element = JaqlElement {
            title: Some("Country".into()),
            filter: Some(json!({ "members": ["Germany", "France"] })),
            ..Default::default()
        };
        assert!(validate_elements(&[element]).is_ok());
    }

    #[test]
    fn sorting_settings_reflect_element_sort_state() {
        let elements = vec![
            JaqlElement {
                title: Some("Country".into()),
                dim: Some("[Country.Country]".into()),
                sort: Some(SortDirection::Asc),
                ..Default::default()
            },
            JaqlElement {
                title: Some("Revenue".into()),
                agg: Some("sum".into()),
                datatype: Some(Datatype::Numeric),
                ..Default::default()
            },
        ];

        let settings = sorting_settings(&elements);
        assert_eq!(settings.len(), 2);
        assert!(settings[0].selected);
        assert_eq!(settings[0].direction, Some(SortDirection::Asc));
        assert!(!settings[1].selected);
        assert_eq!(settings[1].datatype, Datatype::Numeric);
    }

    #[test]
    fn measures_override_their_declared_panel() {
        let measure = JaqlElement {
            agg: Some("sum".into()),
            panel: Some(PanelType::Rows),
            ..Default::default()
        };
        assert_eq!(element_panel(&measure), PanelType::Measures);

        let column_dim = JaqlElement {
            panel: Some(PanelType::Columns),
            ..Default::default()
        };
        assert_eq!(element_panel(&column_dim), PanelType::Columns);
        assert_eq!(element_panel(&JaqlElement::default()), PanelType::Rows);
    }

    #[test]
    fn default_direction_depends_on_measureness() {
        let measure = JaqlElement {
            agg: Some("sum".into()),
            ..Default::default()
        };
        let category = JaqlElement::default();
        assert_eq!(default_direction(&measure), SortDirection::Asc);
        assert_eq!(default_direction(&category), SortDirection::Desc);
    }
}
