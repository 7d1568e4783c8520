use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use libqct::{georef::Wgs84Coordinates, QctFile};
use quick_xml::{
    events::{BytesDecl, BytesText, Event},
    Writer,
};
use tracing::{debug, info};

use super::{ExportError, ExportFormat, Exporter};

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
const GX_NAMESPACE: &str = "http://www.google.com/kml/ext/2.2";

/// Writes a KML 2.2 ground overlay placing the map on the globe.
///
/// The overlay image is expected next to the KML file, with the same stem and a `.png`
/// extension; export the PNG alongside to get a complete overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct KmlExporter;

impl Exporter for KmlExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Kml
    }

    fn export(&self, qct: &QctFile, destination: &Path) -> Result<(), ExportError> {
        let icon = destination
            .with_extension("png")
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Writing KML to {}", destination.display());
        let mut output = write_kml(qct, &icon, BufWriter::new(File::create(destination)?))?;
        output.flush()?;
        Ok(())
    }
}

/// Writes the KML document of `qct` to `output`, referencing the overlay image `icon`
pub(crate) fn write_kml<W: Write>(
    qct: &QctFile,
    icon: &str,
    output: W,
) -> Result<W, ExportError> {
    let name = qct.header().metadata.title.clone().unwrap_or_else(|| {
        qct.path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let corners = qct.corners();
    let outline = &qct.header().outline;
    debug!(?corners, outline = outline.len(), "kml geometry");

    let mut writer = Writer::new_with_indent(output, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element("kml")
        .with_attribute(("xmlns", KML_NAMESPACE))
        .with_attribute(("xmlns:gx", GX_NAMESPACE))
        .write_inner_content(|w| -> quick_xml::Result<()> {
            w.create_element("Document").write_inner_content(|w| -> quick_xml::Result<()> {
                w.create_element("name")
                    .write_text_content(BytesText::new(&name))?;
                ground_overlay(w, &name, icon, &corners)?;
                if !outline.is_empty() {
                    outline_placemark(w, outline)?;
                }
                Ok(())
            })?;
            Ok(())
        })?;
    Ok(writer.into_inner())
}

fn ground_overlay<W: Write>(
    w: &mut Writer<W>,
    name: &str,
    icon: &str,
    corners: &[Wgs84Coordinates; 4],
) -> quick_xml::Result<()> {
    let [top_left, top_right, bottom_right, bottom_left] = corners;
    let bounds = LatLonBox::around(corners);
    w.create_element("GroundOverlay").write_inner_content(|w| -> quick_xml::Result<()> {
        w.create_element("name")
            .write_text_content(BytesText::new(name))?;
        w.create_element("Icon").write_inner_content(|w| -> quick_xml::Result<()> {
            w.create_element("href")
                .write_text_content(BytesText::new(icon))?;
            Ok(())
        })?;
        w.create_element("LatLonBox").write_inner_content(|w| -> quick_xml::Result<()> {
            for (element, value) in [
                ("north", bounds.north),
                ("south", bounds.south),
                ("east", bounds.east),
                ("west", bounds.west),
            ] {
                w.create_element(element)
                    .write_text_content(BytesText::new(&value.to_string()))?;
            }
            Ok(())
        })?;
        // counter-clockwise from the bottom-left corner
        let quad = coordinates(&[*bottom_left, *bottom_right, *top_right, *top_left]);
        w.create_element("gx:LatLonQuad").write_inner_content(|w| -> quick_xml::Result<()> {
            w.create_element("coordinates")
                .write_text_content(BytesText::new(&quad))?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn outline_placemark<W: Write>(
    w: &mut Writer<W>,
    outline: &[Wgs84Coordinates],
) -> quick_xml::Result<()> {
    let mut ring = outline.to_vec();
    if let (Some(first), Some(last)) = (outline.first(), outline.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    w.create_element("Placemark").write_inner_content(|w| -> quick_xml::Result<()> {
        w.create_element("name")
            .write_text_content(BytesText::new("Outline"))?;
        w.create_element("LineString").write_inner_content(|w| -> quick_xml::Result<()> {
            w.create_element("coordinates")
                .write_text_content(BytesText::new(&coordinates(&ring)))?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

/// `lon,lat` tuples separated by spaces
fn coordinates(points: &[Wgs84Coordinates]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", p.longitude, p.latitude))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LatLonBox {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl LatLonBox {
    fn around(points: &[Wgs84Coordinates]) -> Self {
        points.iter().fold(
            Self {
                north: f64::NEG_INFINITY,
                south: f64::INFINITY,
                east: f64::NEG_INFINITY,
                west: f64::INFINITY,
            },
            |b, p| Self {
                north: b.north.max(p.latitude),
                south: b.south.min(p.latitude),
                east: b.east.max(p.longitude),
                west: b.west.min(p.longitude),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(longitude: f64, latitude: f64) -> Wgs84Coordinates {
        Wgs84Coordinates {
            longitude,
            latitude,
        }
    }

    #[test]
    fn bounding_box_of_a_rotated_quad() {
        let bounds = LatLonBox::around(&[
            point(-6.0, 58.0),
            point(-5.0, 58.2),
            point(-5.1, 57.0),
            point(-6.2, 57.1),
        ]);
        assert_eq!(
            bounds,
            LatLonBox {
                north: 58.2,
                south: 57.0,
                east: -5.0,
                west: -6.2
            }
        );
    }

    #[test]
    fn coordinates_are_longitude_first() {
        assert_eq!(
            coordinates(&[point(-6.5, 57.25), point(1.0, 2.0)]),
            "-6.5,57.25 1,2"
        );
    }

    #[test]
    fn outline_ring_is_closed() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        outline_placemark(&mut writer, &[point(0.0, 0.0), point(1.0, 0.0), point(1.0, 1.0)])
            .unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains("<coordinates>0,0 1,0 1,1 0,0</coordinates>"), "{xml}");
    }

    #[test]
    fn ground_overlay_nests_icon_box_and_quad() {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        let corners = [
            point(-6.0, 58.0),
            point(-5.0, 58.0),
            point(-5.0, 57.0),
            point(-6.0, 57.0),
        ];
        ground_overlay(&mut writer, "Torridon", "torridon.png", &corners).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.starts_with("<GroundOverlay><name>Torridon</name>"), "{xml}");
        assert!(xml.contains("<Icon><href>torridon.png</href></Icon>"), "{xml}");
        assert!(xml.contains("<LatLonBox><north>58</north><south>57</south>"), "{xml}");
        assert!(
            xml.contains("<gx:LatLonQuad><coordinates>-6,57 -5,57 -5,58 -6,58</coordinates>"),
            "{xml}"
        );
        assert!(xml.ends_with("</GroundOverlay>"), "{xml}");
    }
}
