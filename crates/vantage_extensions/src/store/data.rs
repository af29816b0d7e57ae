//! Read model returned by the extension queries.
//!
//! [`ExtensionData`] holds one plugin's tabs; each [`ExtensionTabData`] holds the
//! typed values shown in that tab, keyed by provider name.

use serde::Serialize;
use std::collections::HashMap;
use vantage_extension_api::{Color, ElementOrder, FormatType, Icon, TableColumn};

/// Identity of a stored extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionInformation {
    pub id: i64,
    pub name: String,
    pub icon: Icon,
}

/// Presentation metadata of one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDescription {
    pub name: String,
    pub text: String,
    pub description: Option<String>,
    pub icon: Icon,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionBooleanData {
    pub description: ExtensionDescription,
    pub value: bool,
}

impl ExtensionBooleanData {
    pub fn formatted_value(&self) -> &'static str {
        if self.value {
            "Yes"
        } else {
            "No"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionNumberData {
    pub description: ExtensionDescription,
    pub format: FormatType,
    pub value: i64,
}

impl ExtensionNumberData {
    /// Formats through the provider's [`FormatType`].
    pub fn formatted_value(&self) -> String {
        self.format.format(self.value)
    }

    pub fn format_with(&self, formatter: impl Fn(i64) -> String) -> String {
        formatter(self.value)
    }
}

/// Double and percentage values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionDoubleData {
    pub description: ExtensionDescription,
    pub value: f64,
}

impl ExtensionDoubleData {
    pub fn format_with(&self, formatter: impl Fn(f64) -> String) -> String {
        formatter(self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionStringData {
    pub description: ExtensionDescription,
    pub value: String,
    pub player_name: bool,
}

impl ExtensionStringData {
    pub fn formatted_value(&self) -> &str {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionTableData {
    pub provider_name: String,
    pub text: String,
    pub color: Color,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionTabInformation {
    pub name: String,
    pub icon: Icon,
    pub element_order: Vec<ElementOrder>,
    pub priority: i32,
}

impl ExtensionTabInformation {
    /// Tab holding values that declare no tab.
    pub fn default_tab() -> Self {
        Self {
            name: String::new(),
            icon: Icon::default(),
            element_order: ElementOrder::DEFAULT_ORDER.to_vec(),
            priority: 100,
        }
    }
}

/// A typed value of one provider.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DataValue {
    Boolean(ExtensionBooleanData),
    Number(ExtensionNumberData),
    Double(ExtensionDoubleData),
    Percentage(ExtensionDoubleData),
    String(ExtensionStringData),
    Table(ExtensionTableData),
}

impl DataValue {
    fn sort_key(&self) -> (i32, &str) {
        let description = match self {
            DataValue::Boolean(data) => &data.description,
            DataValue::Number(data) => &data.description,
            DataValue::Double(data) | DataValue::Percentage(data) => &data.description,
            DataValue::String(data) => &data.description,
            DataValue::Table(data) => return (i32::MIN, data.provider_name.as_str()),
        };
        (description.priority, description.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionTabData {
    pub information: ExtensionTabInformation,
    booleans: HashMap<String, ExtensionBooleanData>,
    numbers: HashMap<String, ExtensionNumberData>,
    doubles: HashMap<String, ExtensionDoubleData>,
    percentages: HashMap<String, ExtensionDoubleData>,
    strings: HashMap<String, ExtensionStringData>,
    tables: Vec<ExtensionTableData>,
    /// Value names, highest priority first.
    order: Vec<String>,
}

impl ExtensionTabData {
    pub fn new(information: ExtensionTabInformation) -> Self {
        Self {
            information,
            booleans: HashMap::new(),
            numbers: HashMap::new(),
            doubles: HashMap::new(),
            percentages: HashMap::new(),
            strings: HashMap::new(),
            tables: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn boolean(&self, name: &str) -> Option<&ExtensionBooleanData> {
        self.booleans.get(name)
    }

    pub fn number(&self, name: &str) -> Option<&ExtensionNumberData> {
        self.numbers.get(name)
    }

    pub fn double(&self, name: &str) -> Option<&ExtensionDoubleData> {
        self.doubles.get(name)
    }

    pub fn percentage(&self, name: &str) -> Option<&ExtensionDoubleData> {
        self.percentages.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&ExtensionStringData> {
        self.strings.get(name)
    }

    pub fn table_data(&self) -> &[ExtensionTableData] {
        &self.tables
    }

    pub fn value_order(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.tables.is_empty()
    }

    pub(crate) fn put(&mut self, value: DataValue) {
        match value {
            DataValue::Boolean(data) => {
                self.booleans.insert(data.description.name.clone(), data);
            }
            DataValue::Number(data) => {
                self.numbers.insert(data.description.name.clone(), data);
            }
            DataValue::Double(data) => {
                self.doubles.insert(data.description.name.clone(), data);
            }
            DataValue::Percentage(data) => {
                self.percentages.insert(data.description.name.clone(), data);
            }
            DataValue::String(data) => {
                self.strings.insert(data.description.name.clone(), data);
            }
            DataValue::Table(data) => {
                self.tables.push(data);
            }
        }
    }

    /// Inserts several values and refreshes the display order.
    pub(crate) fn put_all(&mut self, mut values: Vec<DataValue>) {
        values.sort_by(|a, b| {
            let (a_priority, a_name) = a.sort_key();
            let (b_priority, b_name) = b.sort_key();
            b_priority.cmp(&a_priority).then_with(|| a_name.cmp(b_name))
        });
        for value in values {
            if !matches!(value, DataValue::Table(_)) {
                let (_, name) = value.sort_key();
                self.order.push(name.to_string());
            }
            self.put(value);
        }
    }
}

/// All tabs of one extension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionData {
    pub information: ExtensionInformation,
    pub tabs: Vec<ExtensionTabData>,
}

impl ExtensionData {
    pub fn name(&self) -> &str {
        &self.information.name
    }

    pub fn tabs(&self) -> &[ExtensionTabData] {
        &self.tabs
    }

    pub fn tab(&self, name: &str) -> Option<&ExtensionTabData> {
        self.tabs.iter().find(|tab| tab.information.name == name)
    }
}

/// Catalog row of one extension with counts of what is stored for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionCatalogEntry {
    pub information: ExtensionInformation,
    pub last_updated: i64,
    pub providers: usize,
    pub disabled_providers: usize,
    pub stored_values: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(name: &str, priority: i32) -> ExtensionDescription {
        ExtensionDescription {
            name: name.to_string(),
            text: name.to_string(),
            description: None,
            icon: Icon::default(),
            priority,
        }
    }

    #[test]
    fn test_values_are_ordered_by_priority_then_name() {
        let mut tab = ExtensionTabData::new(ExtensionTabInformation::default_tab());
        tab.put_all(vec![
            DataValue::Boolean(ExtensionBooleanData {
                description: description("b", 0),
                value: true,
            }),
            DataValue::Number(ExtensionNumberData {
                description: description("a", 0),
                format: FormatType::None,
                value: 1,
            }),
            DataValue::String(ExtensionStringData {
                description: description("z", 10),
                value: "top".to_string(),
                player_name: false,
            }),
        ]);

        assert_eq!(tab.value_order(), &["z", "a", "b"]);
        assert_eq!(tab.boolean("b").map(|b| b.formatted_value()), Some("Yes"));
        assert_eq!(tab.number("a").map(|n| n.formatted_value()), Some("1".to_string()));
        assert!(!tab.is_empty());
    }

    #[test]
    fn test_double_formatter() {
        let data = ExtensionDoubleData {
            description: description("d", 0),
            value: 0.5,
        };
        assert_eq!(data.format_with(|v| v.to_string()), "0.5");
        assert_eq!(data.format_with(|v| format!("{:.0}%", v * 100.0)), "50%");
    }
}
