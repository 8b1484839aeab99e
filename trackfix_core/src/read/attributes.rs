use std::{
    collections::{hash_map::Entry, HashMap},
    str::FromStr,
};

use quick_xml::events::BytesStart;

use crate::error::TrackfixError;

use super::XmlReaderConversions;

/// The attributes of a start tag, held as attr=value pairs for later use.
/// Uploaded files come from arbitrary devices, so extra attributes are kept
/// but never treated as an error.
#[derive(Debug)]
pub(crate) struct Attributes {
    data: HashMap<String, String>,
    start_element_name: String,
}

impl Attributes {
    pub(crate) fn new<C: XmlReaderConversions>(
        start_element: &BytesStart<'_>,
        converter: &C,
    ) -> Result<Self, TrackfixError> {
        let start_element_name =
            converter.bytes_to_string(start_element.name().into_inner())?;

        let mut data = HashMap::new();

        for attr in start_element.attributes() {
            let attr = attr?;
            let key = converter.bytes_to_string(attr.key.into_inner())?;
            let value = converter.cow_to_string(attr.value)?;
            data.insert(key, value);
        }

        Ok(Self {
            data,
            start_element_name,
        })
    }

    /// Gets a mandatory attribute. The attribute is removed from the list of
    /// attributes and returned to the caller.
    pub(crate) fn get<S, T>(&mut self, key: S) -> Result<T, TrackfixError>
    where
        S: Into<String>,
        T: FromStr,
    {
        let key = key.into();

        let value = match self.data.entry(key.clone()) {
            Entry::Occupied(occupied_entry) => occupied_entry.remove(),
            _ => {
                return Err(TrackfixError::InvalidFormat(format!(
                    "mandatory attribute {key} was not found on element {}",
                    self.start_element_name
                )))
            }
        };

        value.parse::<T>().map_err(|_| {
            TrackfixError::InvalidFormat(format!(
                "could not parse {:?} into type {}",
                value,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Gets an optional attribute.
    pub(crate) fn get_opt<S, T>(&mut self, key: S) -> Result<Option<T>, TrackfixError>
    where
        S: Into<String>,
        T: FromStr,
    {
        let key = key.into();
        match self.data.entry(key) {
            Entry::Occupied(occupied_entry) => {
                let value = occupied_entry.remove();
                let parsed = value.parse::<T>().map_err(|_| {
                    TrackfixError::InvalidFormat(format!(
                        "could not parse {:?} into type {}",
                        value,
                        std::any::type_name::<T>()
                    ))
                })?;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::start_parse;
    use quick_xml::Reader;

    #[test]
    fn get_works_for_extant_attributes() {
        let mut xml_reader =
            Reader::from_str(r#"<trkpt lat="51.2194" lon="-1.1" weird="x"><ele>1</ele></trkpt>"#);
        let start = start_parse(&mut xml_reader);
        let mut attrs = Attributes::new(&start, &xml_reader).unwrap();
        let lat: f64 = attrs.get("lat").unwrap();
        let lon: f64 = attrs.get("lon").unwrap();
        assert_eq!(lat, 51.2194);
        assert_eq!(lon, -1.1);
    }

    #[test]
    fn get_returns_error_for_missing_attributes() {
        let mut xml_reader = Reader::from_str(r#"<trkpt lat="51.2194"><ele>1</ele></trkpt>"#);
        let start = start_parse(&mut xml_reader);
        let mut attrs = Attributes::new(&start, &xml_reader).unwrap();
        let result: Result<f64, _> = attrs.get("lon");
        assert!(matches!(result, Err(TrackfixError::InvalidFormat(_))));
    }

    #[test]
    fn get_opt_returns_none_for_missing_attributes() {
        let mut xml_reader = Reader::from_str(r#"<Lap StartTime="x"><a>1</a></Lap>"#);
        let start = start_parse(&mut xml_reader);
        let mut attrs = Attributes::new(&start, &xml_reader).unwrap();
        let sport: Option<String> = attrs.get_opt("Sport").unwrap();
        assert!(sport.is_none());
    }
}
