//! Built-in default table shipped with the registry.
//!
//! | Index | Converter | Creator |
//! |-------|-----------|---------|
//! | marsValidierer | schema-element | schema |
//! | mars-schema | schema-element | schema |
//! | orga | task | task |
//! | issue-condition | noop | issue-condition |
//! | issue-statistics | issue-statistic | issue-statistic |
//! | tag-names | string-map | tags |
//! | ki-wiki-relatives | string-map | noop |

use super::properties::{Attribute, IndexProperties, index_key};

/// One row of the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultIndex {
    pub name: &'static str,
    pub converter: &'static str,
    pub creator: Option<&'static str>,
}

pub static DEFAULT_INDICES: &[DefaultIndex] = &[
    DefaultIndex {
        name: "marsValidierer",
        converter: "schema-element",
        creator: Some("schema"),
    },
    DefaultIndex {
        name: "mars-schema",
        converter: "schema-element",
        creator: Some("schema"),
    },
    DefaultIndex {
        name: "orga",
        converter: "task",
        creator: Some("task"),
    },
    DefaultIndex {
        name: "issue-condition",
        converter: "noop",
        creator: Some("issue-condition"),
    },
    DefaultIndex {
        name: "issue-statistics",
        converter: "issue-statistic",
        creator: Some("issue-statistic"),
    },
    DefaultIndex {
        name: "tag-names",
        converter: "string-map",
        creator: Some("tags"),
    },
    DefaultIndex {
        name: "ki-wiki-relatives",
        converter: "string-map",
        creator: Some("noop"),
    },
];

/// The default table flattened into dotted keys.
pub fn default_properties() -> IndexProperties {
    let mut props = IndexProperties::new();
    for entry in DEFAULT_INDICES {
        props.set(
            index_key(entry.name, Attribute::ConverterClass.as_str()),
            entry.converter,
        );
        if let Some(creator) = entry.creator {
            props.set(index_key(entry.name, Attribute::CreatorClass.as_str()), creator);
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_has_converter_and_creator_keys() {
        let props = default_properties();
        for row in DEFAULT_INDICES {
            assert_eq!(
                props.well_known(row.name, Attribute::ConverterClass),
                Some(row.converter)
            );
            assert_eq!(props.well_known(row.name, Attribute::CreatorClass), row.creator);
            assert_eq!(props.well_known(row.name, Attribute::Path), None);
        }
    }

    #[test]
    fn wiki_relatives_uses_noop_creator() {
        let props = default_properties();
        assert_eq!(
            props.well_known("ki-wiki-relatives", Attribute::CreatorClass),
            Some("noop")
        );
        assert_eq!(props.well_known("unknown", Attribute::ConverterClass), None);
    }
}
