//! Geocoding response translation.
//!
//! Converts one XML response document into a tabular result set whose
//! schema is discovered at parse time: the columns are the union, across
//! all result elements, of every attribute and direct child-element name
//! seen, minus the reserved geometry tag. Result shapes vary between
//! services and queries, so nothing about the schema is assumed up front.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use serde::Serialize;
use wkt::TryFromWkt;

use gazetteer_core::Error;

/// Results container element.
const RESULTS_TAG: &str = "searchresults";

/// Result element, one per candidate location.
const PLACE_TAG: &str = "place";

/// Reserved tag carrying an explicit well-known-text geometry.
const GEOMETRY_TAG: &str = "geotext";

/// Column type, fixed by the first occurrence of a column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Integer,
    Real,
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

/// A named, typed column of the result set.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

/// Geometry attached to a result row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Geometry {
    /// Parsed from the reserved geometry tag.
    Wkt(geo_types::Geometry<f64>),
    /// Synthesized from the row's latitude/longitude fields.
    Point(geo_types::Point<f64>),
    /// The row carries no geometry.
    #[default]
    None,
}

/// One candidate location.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    values: Vec<Option<FieldValue>>,
    geometry: Geometry,
}

impl ResultRow {
    /// Value at a column index; `None` when unset for this row.
    pub fn value(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

/// Tabular result set with a schema discovered at parse time.
///
/// Owned entirely by the caller; dropping it frees everything.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultSet {
    fields: Vec<FieldDef>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    rows: Vec<ResultRow>,
}

impl ResultSet {
    /// Columns in discovery order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Index of a named column.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a named column in a row.
    pub fn value(&self, row: usize, name: &str) -> Option<&FieldValue> {
        let index = self.field_index(name)?;
        self.rows.get(row)?.value(index)
    }

    fn add_field(&mut self, name: &str, field_type: FieldType) {
        self.index.insert(name.to_string(), self.fields.len());
        self.fields.push(FieldDef { name: name.to_string(), field_type });
    }
}

/// Fixed type-inference rules, applied once per distinct column name.
fn infer_type(name: &str) -> FieldType {
    match name {
        "place_rank" => FieldType::Integer,
        "lat" | "lon" => FieldType::Real,
        _ => FieldType::Text,
    }
}

/// Translate one XML response document into a result set.
///
/// Fails with [`Error::Parse`] when the document is not well-formed markup
/// and with [`Error::MissingResults`] when it parses but contains no
/// results container; an empty-but-valid container yields an empty result
/// set. Malformed geometry never fails the document — the affected row is
/// simply geometry-less (or falls back to its coordinates).
pub fn translate(xml: &str) -> Result<ResultSet, Error> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = true;

    let mut set = ResultSet::default();
    let mut in_container = false;
    let mut seen_container = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name_of(e.name());
                if in_container {
                    if name == PLACE_TAG {
                        let fields = collect_place(&mut reader, &e)?;
                        push_row(&mut set, &fields);
                    } else {
                        // Only direct children of the container count.
                        reader
                            .read_to_end(e.name())
                            .map_err(|err| Error::Parse(err.to_string()))?;
                    }
                } else if !seen_container && name == RESULTS_TAG {
                    in_container = true;
                    seen_container = true;
                } else if seen_container {
                    reader
                        .read_to_end(e.name())
                        .map_err(|err| Error::Parse(err.to_string()))?;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name_of(e.name());
                if in_container && name == PLACE_TAG {
                    let fields = attribute_fields(&e)?;
                    push_row(&mut set, &fields);
                } else if !seen_container && name == RESULTS_TAG {
                    seen_container = true;
                }
            }
            Ok(Event::End(e)) => {
                if in_container && local_name_of(e.name()) == RESULTS_TAG {
                    in_container = false;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
    }

    if !seen_container {
        return Err(Error::MissingResults);
    }

    // Columns discovered by later rows apply to the whole set.
    let width = set.fields.len();
    for row in &mut set.rows {
        row.values.resize(width, None);
    }

    Ok(set)
}

fn local_name_of(name: QName<'_>) -> String {
    String::from_utf8_lossy(name.local_name().as_ref()).into_owned()
}

/// A result element's fields: its attributes followed by its direct child
/// elements, each child valued by its first text node.
fn collect_place(
    reader: &mut Reader<&[u8]>, start: &BytesStart<'_>,
) -> Result<Vec<(String, Option<String>)>, Error> {
    let mut fields = attribute_fields(start)?;
    let mut current: Option<(String, Option<String>)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if depth == 0 {
                    current = Some((local_name_of(e.name()), None));
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if depth == 0 {
                    fields.push((local_name_of(e.name()), None));
                }
            }
            Ok(Event::Text(t)) => {
                if depth == 1 {
                    if let Some((_, value)) = current.as_mut() {
                        if value.is_none() {
                            *value =
                                Some(t.unescape().map_err(|e| Error::Parse(e.to_string()))?.into_owned());
                        }
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if depth == 1 {
                    if let Some((_, value)) = current.as_mut() {
                        if value.is_none() {
                            *value = Some(String::from_utf8_lossy(&t).into_owned());
                        }
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(field) = current.take() {
                        fields.push(field);
                    }
                }
            }
            Ok(Event::Eof) => return Err(Error::Parse("unexpected end of document".into())),
            Ok(_) => {}
            Err(e) => return Err(Error::Parse(e.to_string())),
        }
    }

    Ok(fields)
}

fn attribute_fields(start: &BytesStart<'_>) -> Result<Vec<(String, Option<String>)>, Error> {
    let mut fields = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Parse(e.to_string()))?;
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .into_owned();
        fields.push((name, Some(value)));
    }
    Ok(fields)
}

/// Append one row, extending the schema with any unseen column names.
fn push_row(set: &mut ResultSet, fields: &[(String, Option<String>)]) {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    // First pass: register unseen names as columns (first occurrence fixes
    // the type for the whole document) and capture this row's coordinates.
    for (name, value) in fields {
        if name == GEOMETRY_TAG {
            continue;
        }
        if set.field_index(name).is_none() {
            set.add_field(name, infer_type(name));
        }
        match name.as_str() {
            "lat" if lat.is_none() => {
                lat = value.as_deref().and_then(|v| v.trim().parse().ok());
            }
            "lon" if lon.is_none() => {
                lon = value.as_deref().and_then(|v| v.trim().parse().ok());
            }
            _ => {}
        }
    }

    // Second pass: fill the row; unset children stay unset.
    let mut values: Vec<Option<FieldValue>> = vec![None; set.fields.len()];
    let mut geometry = Geometry::None;
    for (name, value) in fields {
        if name == GEOMETRY_TAG {
            if let Some(text) = value {
                if !text.is_empty() {
                    if let Some(parsed) = parse_wkt(text) {
                        geometry = Geometry::Wkt(parsed);
                    }
                }
            }
            continue;
        }
        let Some(index) = set.field_index(name) else { continue };
        let Some(text) = value else { continue };
        values[index] = Some(coerce(set.fields[index].field_type, text));
    }

    // No explicit geometry: synthesize a point from the coordinates.
    if matches!(geometry, Geometry::None) {
        if let (Some(lat), Some(lon)) = (lat, lon) {
            geometry = Geometry::Point(geo_types::Point::new(lon, lat));
        }
    }

    set.rows.push(ResultRow { values, geometry });
}

/// Parse a value under the column's declared type, keeping the raw text
/// when it does not conform.
fn coerce(field_type: FieldType, text: &str) -> FieldValue {
    match field_type {
        FieldType::Integer => text
            .trim()
            .parse::<i64>()
            .map(FieldValue::Integer)
            .unwrap_or_else(|_| FieldValue::Text(text.to_string())),
        FieldType::Real => text
            .trim()
            .parse::<f64>()
            .map(FieldValue::Real)
            .unwrap_or_else(|_| FieldValue::Text(text.to_string())),
        FieldType::Text => FieldValue::Text(text.to_string()),
    }
}

fn parse_wkt(text: &str) -> Option<geo_types::Geometry<f64>> {
    geo_types::Geometry::try_from_wkt_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<searchresults timestamp="Sat, 07 Jun 25 10:00:00 +0000" querystring="paris">
  <place place_id="97084115" lat="48.8" lon="2.3" display_name="Paris, France" place_rank="16" class="place" type="city"/>
  <place place_id="97084116" display_name="Paris, Lamar County, Texas" place_rank="18" geotext="POLYGON((0 0,0 1,1 1,1 0,0 0))"/>
</searchresults>"#;

    #[test]
    fn test_translate_two_places() {
        let set = translate(FIXTURE_XML).unwrap();
        assert_eq!(set.len(), 2);

        // Synthesized point at (lon, lat) for the row without geometry.
        match set.rows()[0].geometry() {
            Geometry::Point(p) => {
                assert_eq!(p.x(), 2.3);
                assert_eq!(p.y(), 48.8);
            }
            other => panic!("expected synthesized point, got {other:?}"),
        }

        // Explicitly parsed geometry for the row with a geotext value.
        assert!(matches!(
            set.rows()[1].geometry(),
            Geometry::Wkt(geo_types::Geometry::Polygon(_))
        ));
    }

    #[test]
    fn test_schema_types_and_values() {
        let set = translate(FIXTURE_XML).unwrap();

        let lat = set.field_index("lat").unwrap();
        assert_eq!(set.fields()[lat].field_type, FieldType::Real);
        let rank = set.field_index("place_rank").unwrap();
        assert_eq!(set.fields()[rank].field_type, FieldType::Integer);
        let name = set.field_index("display_name").unwrap();
        assert_eq!(set.fields()[name].field_type, FieldType::Text);

        assert_eq!(set.value(0, "lat"), Some(&FieldValue::Real(48.8)));
        assert_eq!(set.value(0, "place_rank"), Some(&FieldValue::Integer(16)));
        assert_eq!(
            set.value(1, "display_name"),
            Some(&FieldValue::Text("Paris, Lamar County, Texas".to_string()))
        );

        // The second place has no coordinates; its cells stay unset.
        assert!(set.value(1, "lat").is_none());
        assert!(set.value(1, "lon").is_none());

        // The reserved geometry tag never becomes a column.
        assert!(set.field_index("geotext").is_none());
    }

    #[test]
    fn test_child_elements_become_columns() {
        let xml = r#"<searchresults>
  <place lat="45.76" lon="4.83">
    <county>M&#233;tropole de Lyon</county>
    <country>France</country>
  </place>
  <place lat="45.0" lon="3.0" display_name="Elsewhere"/>
</searchresults>"#;

        let set = translate(xml).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.value(0, "county"),
            Some(&FieldValue::Text("Métropole de Lyon".to_string()))
        );
        assert_eq!(set.value(0, "country"), Some(&FieldValue::Text("France".to_string())));

        // Union schema: columns introduced by one row exist for all rows,
        // unset elsewhere.
        assert!(set.value(1, "county").is_none());
        assert!(set.value(0, "display_name").is_none());
        assert!(matches!(set.rows()[1].geometry(), Geometry::Point(_)));
    }

    #[test]
    fn test_empty_container_yields_empty_set() {
        for xml in ["<searchresults/>", "<searchresults></searchresults>"] {
            let set = translate(xml).unwrap();
            assert!(set.is_empty());
            assert!(set.fields().is_empty());
        }
    }

    #[test]
    fn test_missing_container_fails() {
        assert!(matches!(translate("<foo><bar/></foo>"), Err(Error::MissingResults)));
    }

    #[test]
    fn test_malformed_markup_fails() {
        assert!(matches!(
            translate("<searchresults><place</searchresults>"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            translate("<searchresults><place></searchresults>"),
            Err(Error::Parse(_))
        ));
        assert!(translate("no markup at all").is_err());
    }

    #[test]
    fn test_malformed_geotext_degrades_per_row() {
        let xml = r#"<searchresults>
  <place lat="48.8" lon="2.3" geotext="POLYGON(("/>
  <place geotext="POLYGON(("/>
</searchresults>"#;
        let set = translate(xml).unwrap();
        assert!(matches!(set.rows()[0].geometry(), Geometry::Point(_)));
        assert_eq!(set.rows()[1].geometry(), &Geometry::None);
    }

    #[test]
    fn test_partial_coordinates_leave_row_geometry_less() {
        let set = translate(r#"<searchresults><place lat="48.8"/></searchresults>"#).unwrap();
        assert_eq!(set.rows()[0].geometry(), &Geometry::None);
    }

    #[test]
    fn test_first_seen_type_wins() {
        let xml = r#"<searchresults>
  <place lat="48.8" lon="2.3" place_rank="16"/>
  <place lat="not-a-number" lon="2.0" place_rank="high"/>
</searchresults>"#;
        let set = translate(xml).unwrap();

        let lat = set.field_index("lat").unwrap();
        assert_eq!(set.fields()[lat].field_type, FieldType::Real);

        // Non-conforming values keep their text representation; the column
        // keeps its first-seen type.
        assert_eq!(set.value(1, "lat"), Some(&FieldValue::Text("not-a-number".to_string())));
        assert_eq!(set.value(1, "place_rank"), Some(&FieldValue::Text("high".to_string())));

        // An unparsable latitude also means no synthesized point.
        assert_eq!(set.rows()[1].geometry(), &Geometry::None);
    }

    #[test]
    fn test_result_set_serializes() {
        let set = translate(FIXTURE_XML).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert!(json.contains("display_name"));
        assert!(json.contains("48.8"));
    }
}
