use std::io::Read;

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{NewProperty, PropertyStatus, PropertyType, PropertyView};

const EXPORT_HEADER: [&str; 9] = [
    "unit_number",
    "type",
    "status",
    "block",
    "zone",
    "area",
    "coefficient",
    "owner_name",
    "active_residents",
];

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    unit_number: &'a str,
    property_type: &'static str,
    status: &'static str,
    block: &'a str,
    zone: &'a str,
    area: Option<f64>,
    coefficient: f64,
    owner_name: &'a str,
    active_residents: usize,
}

/// Serialize properties with a header row, even when there are none.
pub(crate) fn write_properties(views: &[PropertyView]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;

    for view in views {
        let property = &view.property;
        writer.serialize(ExportRow {
            unit_number: &property.unit_number,
            property_type: property.property_type.label(),
            status: property.status.label(),
            block: property.block.as_deref().unwrap_or_default(),
            zone: property.zone.as_deref().unwrap_or_default(),
            area: property.area,
            coefficient: property.coefficient,
            owner_name: property.owner_name.as_deref().unwrap_or_default(),
            active_residents: view.active_residents,
        })?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    unit_number: String,
    #[serde(rename = "type")]
    property_type: PropertyType,
    #[serde(default)]
    status: Option<PropertyStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    block: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    zone: Option<String>,
    #[serde(default)]
    area: Option<f64>,
    #[serde(default)]
    coefficient: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    owner_name: Option<String>,
}

/// Parse an import sheet into property drafts for `complex_id`. Extra columns are ignored.
pub(crate) fn parse_properties<R: Read>(
    reader: R,
    complex_id: u64,
) -> Result<Vec<NewProperty>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut drafts = Vec::new();

    for record in csv_reader.deserialize::<ImportRow>() {
        let row = record?;
        drafts.push(NewProperty {
            complex_id,
            unit_number: row.unit_number,
            property_type: row.property_type,
            status: row.status.unwrap_or_default(),
            area: row.area,
            block: row.block,
            zone: row.zone,
            owner_id: None,
            owner_name: row.owner_name,
            coefficient: row.coefficient.unwrap_or_default(),
        });
    }

    Ok(drafts)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|raw| !raw.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_optional_columns() {
        let sheet = "unit_number,type,status,block,zone,area,coefficient,owner_name\n\
                     101,APARTMENT,OCCUPIED,A,,72.5,1.25,Laura Gómez\n\
                     L-2, COMMERCIAL ,,,,,,\n";
        let drafts = parse_properties(sheet.as_bytes(), 3).expect("sheet parses");

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].status, PropertyStatus::Occupied);
        assert_eq!(drafts[0].block.as_deref(), Some("A"));
        assert!(drafts[0].zone.is_none());
        assert_eq!(drafts[0].owner_name.as_deref(), Some("Laura Gómez"));
        assert_eq!(drafts[1].property_type, PropertyType::Commercial);
        assert_eq!(drafts[1].status, PropertyStatus::Available);
        assert_eq!(drafts[1].coefficient, 0.0);
        assert!(drafts.iter().all(|draft| draft.complex_id == 3));
    }

    #[test]
    fn rejects_unknown_property_type() {
        let sheet = "unit_number,type\n101,CASTLE\n";
        assert!(parse_properties(sheet.as_bytes(), 1).is_err());
    }

    #[test]
    fn export_writes_header_without_rows() {
        let bytes = write_properties(&[]).expect("export");
        let text = String::from_utf8(bytes).expect("utf8");
        assert_eq!(
            text.trim_end(),
            "unit_number,type,status,block,zone,area,coefficient,owner_name,active_residents"
        );
    }
}
