//! XML metadata carried in segment 0 of every blob.
//!
//! Only the parts of the `SickRecord` document needed to decode the binary
//! segment and to describe the camera are mapped; everything else is ignored.

use crate::error::ProtocolError;
use crate::segment::PlaneLayout;
use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const IDENTITY: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Storage type of one pixel in a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    Uint8,
    Uint16,
    Uint32,
    Float32,
}

impl PixelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelType::Uint8 => "uint8",
            PixelType::Uint16 => "uint16",
            PixelType::Uint32 => "uint32",
            PixelType::Float32 => "float32",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PixelType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "uint8" => Ok(PixelType::Uint8),
            "uint16" => Ok(PixelType::Uint16),
            "uint32" => Ok(PixelType::Uint32),
            "float32" => Ok(PixelType::Float32),
            other => Err(ProtocolError::InvalidMetadata(format!(
                "unknown pixel type {:?}",
                other
            ))),
        }
    }
}

/// Value encoding of one image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFormat {
    pub pixel_type: PixelType,
    pub decimal_exponent: i32,
    pub min: f64,
    pub max: f64,
}

impl PlaneFormat {
    pub fn uint16(min: f64, max: f64) -> Self {
        Self {
            pixel_type: PixelType::Uint16,
            decimal_exponent: 0,
            min,
            max,
        }
    }
}

/// Geometry and calibration of the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParameters {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    /// Focal-to-ray-cross distance.
    pub f2rc: f64,
    /// Row-major 4x4 camera-to-world transform.
    pub cam2world: [f64; 16],
}

impl CameraParameters {
    /// Parameters with the given resolution, zero intrinsics and identity pose.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fx: 0.0,
            fy: 0.0,
            cx: 0.0,
            cy: 0.0,
            k1: 0.0,
            k2: 0.0,
            p1: 0.0,
            p2: 0.0,
            k3: 0.0,
            f2rc: 0.0,
            cam2world: IDENTITY,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Decoded metadata document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlMetadata {
    pub camera: CameraParameters,
    pub distance: Option<PlaneFormat>,
    pub intensity: Option<PlaneFormat>,
    pub confidence: Option<PlaneFormat>,
    pub device_ident: Option<String>,
}

impl XmlMetadata {
    /// Depth map description with all three 16-bit planes.
    pub fn depth_map(camera: CameraParameters) -> Self {
        Self {
            camera,
            distance: Some(PlaneFormat::uint16(1.0, 16384.0)),
            intensity: Some(PlaneFormat::uint16(1.0, 20000.0)),
            confidence: Some(PlaneFormat::uint16(0.0, 65535.0)),
            device_ident: None,
        }
    }

    /// Parses the metadata segment.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, ProtocolError> {
        let xml = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
        Self::parse(xml)
    }

    pub fn parse(xml: &str) -> Result<Self, ProtocolError> {
        let record: RawRecord =
            from_str(xml).map_err(|e| ProtocolError::InvalidMetadata(e.to_string()))?;
        let depth_map = record.data_sets.depth_map;
        let stream = depth_map.format.stream;

        if stream.width == 0 || stream.height == 0 {
            return Err(ProtocolError::InvalidMetadata(format!(
                "invalid resolution {}x{}",
                stream.width, stream.height
            )));
        }

        let cam2world = match stream.cam2world.value.len() {
            0 => IDENTITY,
            16 => {
                let mut m = [0.0; 16];
                m.copy_from_slice(&stream.cam2world.value);
                m
            }
            n => {
                return Err(ProtocolError::InvalidMetadata(format!(
                    "camera-to-world transform has {} values, expected 16",
                    n
                )))
            }
        };

        let camera = CameraParameters {
            width: stream.width,
            height: stream.height,
            fx: stream.camera_matrix.fx,
            fy: stream.camera_matrix.fy,
            cx: stream.camera_matrix.cx,
            cy: stream.camera_matrix.cy,
            k1: stream.distortion.k1,
            k2: stream.distortion.k2,
            p1: stream.distortion.p1,
            p2: stream.distortion.p2,
            k3: stream.distortion.k3,
            f2rc: stream.f2rc.unwrap_or(0.0),
            cam2world,
        };

        Ok(Self {
            camera,
            distance: stream.distance.map(RawPlane::into_format).transpose()?,
            intensity: stream.intensity.map(RawPlane::into_format).transpose()?,
            confidence: stream.confidence.map(RawPlane::into_format).transpose()?,
            device_ident: depth_map.device.and_then(|d| d.ident),
        })
    }

    /// Binary plane layout implied by this metadata.
    ///
    /// Only 16-bit planes are decoded.
    pub fn plane_layout(&self) -> Result<PlaneLayout, ProtocolError> {
        let check = |plane: &'static str, format: &Option<PlaneFormat>| match format {
            Some(f) if f.pixel_type != PixelType::Uint16 => {
                Err(ProtocolError::UnsupportedPixelType {
                    plane,
                    pixel_type: f.pixel_type.to_string(),
                })
            }
            Some(_) => Ok(true),
            None => Ok(false),
        };
        Ok(PlaneLayout {
            width: self.camera.width,
            height: self.camera.height,
            distance: check("distance", &self.distance)?,
            intensity: check("intensity", &self.intensity)?,
            confidence: check("confidence", &self.confidence)?,
        })
    }

    /// Serializes to a `SickRecord` document.
    pub fn to_xml(&self) -> Result<String, ProtocolError> {
        let c = &self.camera;
        let record = RawRecord {
            data_sets: RawDataSets {
                depth_map: RawDepthMap {
                    device: self.device_ident.clone().map(|ident| RawDevice {
                        ident: Some(ident),
                    }),
                    format: RawFormat {
                        stream: RawDataStream {
                            width: c.width,
                            height: c.height,
                            cam2world: RawTransform {
                                value: c.cam2world.to_vec(),
                            },
                            camera_matrix: RawCameraMatrix {
                                fx: c.fx,
                                fy: c.fy,
                                cx: c.cx,
                                cy: c.cy,
                            },
                            distortion: RawDistortion {
                                k1: c.k1,
                                k2: c.k2,
                                p1: c.p1,
                                p2: c.p2,
                                k3: c.k3,
                            },
                            f2rc: Some(c.f2rc),
                            distance: self.distance.map(RawPlane::from),
                            intensity: self.intensity.map(RawPlane::from),
                            confidence: self.confidence.map(RawPlane::from),
                        },
                    },
                },
            },
        };
        let xml = to_string(&record).map_err(|e| ProtocolError::InvalidMetadata(e.to_string()))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", xml))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "SickRecord")]
struct RawRecord {
    #[serde(rename = "DataSets")]
    data_sets: RawDataSets,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDataSets {
    #[serde(rename = "DataSetDepthMap")]
    depth_map: RawDepthMap,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDepthMap {
    #[serde(
        rename = "DeviceDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    device: Option<RawDevice>,
    #[serde(rename = "FormatDescriptionDepthMap")]
    format: RawFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDevice {
    #[serde(rename = "Ident", default, skip_serializing_if = "Option::is_none")]
    ident: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFormat {
    #[serde(rename = "DataStream")]
    stream: RawDataStream,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawDataStream {
    #[serde(rename = "Width")]
    width: u32,
    #[serde(rename = "Height")]
    height: u32,
    #[serde(rename = "CameraToWorldTransform", default)]
    cam2world: RawTransform,
    #[serde(rename = "CameraMatrix", default)]
    camera_matrix: RawCameraMatrix,
    #[serde(rename = "CameraDistortionParams", default)]
    distortion: RawDistortion,
    #[serde(
        rename = "FocalToRayCross",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    f2rc: Option<f64>,
    #[serde(rename = "Distance", default, skip_serializing_if = "Option::is_none")]
    distance: Option<RawPlane>,
    #[serde(rename = "Intensity", default, skip_serializing_if = "Option::is_none")]
    intensity: Option<RawPlane>,
    #[serde(rename = "Confidence", default, skip_serializing_if = "Option::is_none")]
    confidence: Option<RawPlane>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawTransform {
    #[serde(default)]
    value: Vec<f64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawCameraMatrix {
    #[serde(rename = "FX", default)]
    fx: f64,
    #[serde(rename = "FY", default)]
    fy: f64,
    #[serde(rename = "CX", default)]
    cx: f64,
    #[serde(rename = "CY", default)]
    cy: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDistortion {
    #[serde(rename = "K1", default)]
    k1: f64,
    #[serde(rename = "K2", default)]
    k2: f64,
    #[serde(rename = "P1", default)]
    p1: f64,
    #[serde(rename = "P2", default)]
    p2: f64,
    #[serde(rename = "K3", default)]
    k3: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawPlane {
    #[serde(rename = "@decimalexponent", default)]
    decimal_exponent: i32,
    #[serde(rename = "@min", default)]
    min: f64,
    #[serde(rename = "@max", default)]
    max: f64,
    #[serde(rename = "$text")]
    pixel_type: String,
}

impl RawPlane {
    fn into_format(self) -> Result<PlaneFormat, ProtocolError> {
        Ok(PlaneFormat {
            pixel_type: self.pixel_type.parse()?,
            decimal_exponent: self.decimal_exponent,
            min: self.min,
            max: self.max,
        })
    }
}

impl From<PlaneFormat> for RawPlane {
    fn from(format: PlaneFormat) -> Self {
        Self {
            decimal_exponent: format.decimal_exponent,
            min: format.min,
            max: format.max,
            pixel_type: format.pixel_type.as_str().to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Trimmed record as emitted by a Visionary-T Mini.
    pub(crate) const SAMPLE_XML: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        r#"<SickRecord xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
        r#"<Revision>SICK V1.10 in work</Revision>"#,
        r#"<DataSets><DataSetDepthMap id="1" datacount="1">"#,
        r#"<DeviceDescription><Family>V3SXX5-1</Family>"#,
        r#"<Ident>Visionary-T Mini CX V3S105-1x 2.0.0.457B</Ident>"#,
        r#"<Version>3.0.0.2334</Version></DeviceDescription>"#,
        r#"<FormatDescriptionDepthMap><TimestampUTC/><Version>uint16</Version>"#,
        r#"<DataStream><Interleaved>false</Interleaved>"#,
        r#"<Width>512</Width><Height>424</Height>"#,
        r#"<CameraToWorldTransform>"#,
        r#"<value>1.000000</value><value>0.000000</value><value>0.000000</value><value>0.000000</value>"#,
        r#"<value>0.000000</value><value>1.000000</value><value>0.000000</value><value>0.000000</value>"#,
        r#"<value>0.000000</value><value>0.000000</value><value>1.000000</value><value>-10.000000</value>"#,
        r#"<value>0.000000</value><value>0.000000</value><value>0.000000</value><value>1.000000</value>"#,
        r#"</CameraToWorldTransform>"#,
        r#"<CameraMatrix><FX>-366.964999</FX><FY>-367.057999</FY><CX>252.118999</CX><CY>205.213999</CY></CameraMatrix>"#,
        r#"<CameraDistortionParams><K1>-0.076050</K1><K2>0.217518</K2><P1>0.000000</P1><P2>0.000000</P2><K3>0.000000</K3></CameraDistortionParams>"#,
        r#"<FrameNumber>uint32</FrameNumber><Quality>uint8</Quality><Status>uint8</Status>"#,
        r#"<PixelSize><X>1.000000</X><Y>1.000000</Y><Z>0.250000</Z></PixelSize>"#,
        r#"<Distance decimalexponent="0" min="1" max="16384">uint16</Distance>"#,
        r#"<Intensity decimalexponent="0" min="1" max="20000">uint16</Intensity>"#,
        r#"<Confidence decimalexponent="0" min="0" max="65535">uint16</Confidence>"#,
        r#"</DataStream><DeviceInfo><Status>OK</Status></DeviceInfo></FormatDescriptionDepthMap>"#,
        r#"<DataLink><FileName>data.bin</FileName></DataLink>"#,
        r#"</DataSetDepthMap></DataSets></SickRecord>"#,
    );

    #[test]
    fn test_parse_device_record() {
        let meta = XmlMetadata::parse(SAMPLE_XML).unwrap();
        let c = &meta.camera;
        assert_eq!((c.width, c.height), (512, 424));
        assert!((c.fx + 366.964999).abs() < 1e-9);
        assert!((c.cy - 205.213999).abs() < 1e-9);
        assert!((c.k2 - 0.217518).abs() < 1e-9);
        assert_eq!(c.cam2world[11], -10.0);
        assert_eq!(c.cam2world[15], 1.0);
        assert_eq!(c.f2rc, 0.0);

        let distance = meta.distance.unwrap();
        assert_eq!(distance.pixel_type, PixelType::Uint16);
        assert_eq!(distance.max, 16384.0);
        assert_eq!(meta.confidence.unwrap().max, 65535.0);
        assert_eq!(
            meta.device_ident.as_deref(),
            Some("Visionary-T Mini CX V3S105-1x 2.0.0.457B")
        );
    }

    #[test]
    fn test_plane_layout() {
        let meta = XmlMetadata::parse(SAMPLE_XML).unwrap();
        let layout = meta.plane_layout().unwrap();
        assert!(layout.distance && layout.intensity && layout.confidence);
        assert_eq!(layout.plane_bytes(), 512 * 424 * 2 * 3);
    }

    #[test]
    fn test_missing_planes() {
        let xml = SAMPLE_XML.replace(
            r#"<Intensity decimalexponent="0" min="1" max="20000">uint16</Intensity>"#,
            "",
        );
        let meta = XmlMetadata::parse(&xml).unwrap();
        assert!(meta.intensity.is_none());
        let layout = meta.plane_layout().unwrap();
        assert!(!layout.intensity);
        assert_eq!(layout.plane_bytes(), 512 * 424 * 2 * 2);
    }

    #[test]
    fn test_unsupported_pixel_type() {
        let xml = SAMPLE_XML.replace(">uint16</Distance>", ">float32</Distance>");
        let meta = XmlMetadata::parse(&xml).unwrap();
        assert!(matches!(
            meta.plane_layout(),
            Err(ProtocolError::UnsupportedPixelType { plane: "distance", .. })
        ));
    }

    #[test]
    fn test_invalid_documents() {
        assert!(XmlMetadata::parse("").is_err());
        assert!(XmlMetadata::parse("<SickRecord>").is_err());
        assert!(XmlMetadata::from_bytes(&[0xFF, 0xFE]).is_err());

        let zero = SAMPLE_XML.replace("<Width>512</Width>", "<Width>0</Width>");
        assert!(XmlMetadata::parse(&zero).is_err());

        let short = SAMPLE_XML.replace(
            "<value>1.000000</value></CameraToWorldTransform>",
            "</CameraToWorldTransform>",
        );
        assert!(XmlMetadata::parse(&short).is_err());

        let cut = SAMPLE_XML.find("<Width>").unwrap();
        assert!(XmlMetadata::parse(&SAMPLE_XML[..cut]).is_err());
    }

    #[test]
    fn test_to_xml_reparses() {
        let mut camera = CameraParameters::new(4, 2);
        camera.fx = 146.5;
        camera.k1 = -0.25;
        camera.f2rc = 1.5;
        let mut meta = XmlMetadata::depth_map(camera);
        meta.device_ident = Some("sim".into());

        let xml = meta.to_xml().unwrap();
        assert_eq!(XmlMetadata::parse(&xml).unwrap(), meta);
    }
}
