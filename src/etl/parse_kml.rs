use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::Coordinate;
use crate::data::kml::{Geometry, Placemark};
use crate::errors::{Error, ErrorKind, Result};

/// Placemark under construction while its children are being read.
struct PlacemarkBuilder {
    depth: usize,
    name: Option<String>,
    geometry: Geometry,
}

impl PlacemarkBuilder {
    /// Applies a closed child element. `level` is the nesting depth of the
    /// element itself, `text` its collected character data.
    fn close_child(&mut self, local_name: &[u8], parent: Option<&[u8]>, level: usize, text: &str) -> Result<()> {
        match (local_name, parent) {
            (b"name", _) if level == self.depth + 1 => {
                self.name = Some(text.trim().to_string());
            },
            (b"coordinates", Some(b"LineString")) if self.geometry == Geometry::Other => {
                self.geometry = Geometry::LineString(parse_coordinates(text)?);
            },
            (b"coordinates", Some(b"Point")) if self.geometry == Geometry::Other => {
                let point = parse_coordinates(text)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::parse("point without coordinates"))?;
                self.geometry = Geometry::Point(point);
            },
            // A geometry element that closed without usable coordinates still
            // counts as that geometry, so callers can reject it.
            (b"LineString", _) if self.geometry == Geometry::Other => {
                self.geometry = Geometry::LineString(Vec::new());
            },
            (b"Point", _) if self.geometry == Geometry::Other => {
                return Err(Error::parse("point without coordinates"));
            },
            _ => (),
        }
        Ok(())
    }

    fn build(self) -> Placemark {
        Placemark {
            name: self.name.unwrap_or_default(),
            geometry: self.geometry,
        }
    }
}

/// Element stack and placemark state of one document walk.
#[derive(Default)]
struct PlacemarkScanner {
    path: Vec<Vec<u8>>,
    text: String,
    current: Option<PlacemarkBuilder>,
    placemarks: Vec<Placemark>,
}

impl PlacemarkScanner {
    fn open(&mut self, local_name: &[u8]) {
        if local_name == b"Placemark" {
            self.current = Some(PlacemarkBuilder {
                depth: self.path.len(),
                name: None,
                geometry: Geometry::Other,
            });
        }
        self.path.push(local_name.to_vec());
        self.text.clear();
    }

    /// Closes the innermost open element.
    fn close(&mut self) -> Result<()> {
        let level = self.path.len().saturating_sub(1);
        let Some(local_name) = self.path.pop() else {
            return Ok(());
        };
        if local_name == b"Placemark" {
            if let Some(builder) = self.current.take() {
                self.placemarks.push(builder.build());
            }
        } else if let Some(builder) = self.current.as_mut() {
            let parent = self.path.last().map(Vec::as_slice);
            builder.close_child(&local_name, parent, level, &self.text)?;
        }
        self.text.clear();
        Ok(())
    }
}

fn parse_tuple(tuple: &str) -> Result<Coordinate> {
    let mut parts = tuple.split(',');
    let (Some(lon), Some(lat)) = (parts.next(), parts.next()) else {
        return Err(Error::parse(format!("coordinate '{}' needs at least lon,lat", tuple)));
    };
    let lon: f64 = lon.trim().parse()?;
    let lat: f64 = lat.trim().parse()?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::parse(format!("coordinate '{}' is out of range", tuple)));
    }
    Ok(Coordinate::new(lat, lon))
}

/// Parses the text of a `<coordinates>` element: whitespace separated
/// `lon,lat[,alt]` tuples. Altitude is dropped and the axes are swapped.
pub fn parse_coordinates(text: &str) -> Result<Vec<Coordinate>> {
    text.split_whitespace().map(parse_tuple).collect()
}

fn create_kml_reader(path: &Path) -> Result<Reader<Box<dyn BufRead>>> {
    let file = fs::File::open(path)?;
    let file_reader = BufReader::new(file);
    let source: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    Ok(reader)
}

/// Reads every `Placemark` of a KML document in document order. Namespace
/// prefixes are ignored. When a placemark carries several geometries only the
/// first `LineString` or `Point` is kept.
pub fn read_placemarks<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<Placemark>> {
    let mut buf = Vec::new();
    let mut scanner = PlacemarkScanner::default();

    loop {
        let event = reader.read_event_into(&mut buf)
            .map_err(|err| Error::from(err).context(format!("at byte {}", reader.buffer_position())))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => scanner.open(e.local_name().as_ref()),
            // `<coordinates/>` and friends: an element with no content.
            Event::Empty(e) => {
                scanner.open(e.local_name().as_ref());
                scanner.close()?;
            },
            Event::Text(e) => scanner.text.push_str(&e.unescape()?),
            Event::CData(e) => scanner.text.push_str(&reader.decoder().decode(&e)?),
            Event::End(_) => scanner.close()?,
            // Declarations, comments and processing instructions carry
            // nothing we use.
            _ => (),
        }
        buf.clear();
    }

    if scanner.current.is_some() {
        return Err(Error::parse("document ended inside a Placemark"));
    }
    Ok(scanner.placemarks)
}

/// Opens and reads a KML file (optionally `.xz` compressed). Any failure,
/// including an unreadable file, is reported as a parse error naming the path.
pub fn load_placemarks(path: &Path) -> Result<Vec<Placemark>> {
    let read = || -> Result<Vec<Placemark>> {
        let mut reader = create_kml_reader(path)?;
        read_placemarks(&mut reader)
    };
    let placemarks = read().map_err(|err| {
        Error::new(ErrorKind::Parse, err.message).context(path.display())
    })?;
    debug!(path = path.display().to_string().as_str(), placemarks = placemarks.len(); "Read KML document");
    Ok(placemarks)
}
