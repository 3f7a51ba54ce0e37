use super::Template;
use crate::amount::{format_amount, parse_value};
use api_shared::wire::PopulatedField;
use std::collections::HashMap;

/// Fill computed rows (those with a calculation) from reported components.
///
/// Fields are visited in template order so that subtotals feed later totals. A computed row
/// is only derived when it is not already populated and at least one of its inputs carries
/// an amount; absent inputs count as zero and are named in the justification. The citation
/// is the row's catalog reference.
///
/// Returns `fields` with derived rows appended in template order.
pub fn derive_totals(template: &Template, fields: Vec<PopulatedField>) -> Vec<PopulatedField> {
    let mut amounts: HashMap<String, f64> = fields
        .iter()
        .filter_map(|f| Some((f.field_code.clone(), parse_value(&f.value).amount()?)))
        .collect();
    let populated: std::collections::HashSet<String> =
        fields.iter().map(|f| f.field_code.clone()).collect();

    let mut out = fields;

    for field in &template.fields {
        let Some(calc) = &field.calculation else {
            continue;
        };
        if populated.contains(&field.field_code) {
            continue;
        }
        if !calc.inputs().any(|code| amounts.contains_key(code)) {
            continue;
        }

        let value_of = |code: &String| amounts.get(code).copied().unwrap_or(0.0);
        let total = calc.add.iter().map(value_of).sum::<f64>()
            - calc.subtract.iter().map(value_of).sum::<f64>();

        let absent: Vec<&str> = calc
            .inputs()
            .filter(|code| !amounts.contains_key(*code))
            .map(String::as_str)
            .collect();

        let mut justification = format!("Derived as {calc} from reported components");
        if !absent.is_empty() {
            justification.push_str(&format!(
                "; absent components treated as zero: {}",
                absent.join(", ")
            ));
        }

        tracing::debug!("derived {} = {}", field.field_code, total);
        amounts.insert(field.field_code.clone(), total);
        out.push(PopulatedField {
            field_code: field.field_code.clone(),
            field_name: field.field_name.clone(),
            value: format_amount(total),
            justification,
            source_rule: field.reference.clone(),
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateCatalog;

    fn reported(code: &str, value: &str) -> PopulatedField {
        PopulatedField {
            field_code: code.into(),
            field_name: code.into(),
            value: value.into(),
            justification: "reported".into(),
            source_rule: "PRA Rulebook".into(),
        }
    }

    fn value_of<'a>(fields: &'a [PopulatedField], code: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|f| f.field_code == code)
            .map(|f| f.value.as_str())
    }

    #[test]
    fn test_derive_totals_builds_cet1_tier1_and_total_capital() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");

        let fields = derive_totals(
            template,
            vec![
                reported("C_01.00_r010", "£500M"),
                reported("C_01.00_r020", "£200M"),
                reported("C_01.00_r070", "£75M"),
            ],
        );

        assert_eq!(value_of(&fields, "C_01.00_r110"), Some("£75M"));
        assert_eq!(value_of(&fields, "C_01.00_r120"), Some("£625M"));
        assert_eq!(value_of(&fields, "C_01.00_r170"), Some("£625M"));
        assert_eq!(value_of(&fields, "C_01.00_r230"), Some("£625M"));
        assert_eq!(value_of(&fields, "C_01.00_r160"), None);
        assert_eq!(value_of(&fields, "C_01.00_r220"), None);

        let cet1 = fields
            .iter()
            .find(|f| f.field_code == "C_01.00_r120")
            .expect("CET1 derived");
        assert_eq!(cet1.source_rule, "COREP C 01.00 row 120");
        assert!(cet1.justification.contains("r030"));
    }

    #[test]
    fn test_derive_totals_keeps_reported_totals() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");

        let fields = derive_totals(
            template,
            vec![
                reported("C_01.00_r010", "£500M"),
                reported("C_01.00_r120", "£480M"),
            ],
        );

        assert_eq!(value_of(&fields, "C_01.00_r120"), Some("£480M"));
        assert_eq!(value_of(&fields, "C_01.00_r170"), Some("£480M"));
    }

    #[test]
    fn test_derive_totals_skips_rows_without_any_amount() {
        let catalog = TemplateCatalog::builtin().expect("builtin catalog should load");
        let template = catalog.get_template("C_01.00").expect("template exists");

        let fields = derive_totals(template, vec![reported("C_01.00_r010", "N/A")]);
        assert_eq!(fields.len(), 1);
    }
}
