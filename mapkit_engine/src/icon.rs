//! Image references for placemark icons.
//!
//! The bridge never decodes images; it only tells the engine which asset to use. On the wire an
//! icon is a list of strings where the first element names the kind of reference, e.g.
//! `["fromAsset", "assets/pin.png"]` or `["fromAssetImage", "assets/pin.png", "24", "32"]`.

use compact_str::{format_compact, CompactString};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CompactString>", into = "Vec<CompactString>")]
pub enum Icon {
    /// The engine's default placemark image.
    DefaultMarker,
    /// An asset, optionally from another package.
    Asset {
        name: CompactString,
        package: Option<CompactString>,
    },
    /// An asset scaled by a factor.
    ScaledAsset { name: CompactString, scale: f64 },
    /// An asset resized to fit within `width` x `height` logical pixels.
    SizedAsset {
        name: CompactString,
        width: f64,
        height: f64,
    },
}

#[derive(Clone, Debug, PartialEq, derive_more::Display, derive_more::Error)]
pub enum IconError {
    #[display("Empty icon reference")]
    Empty,
    #[display("Unknown icon kind `{_0}`")]
    UnknownKind(#[error(not(source))] CompactString),
    #[display("Bad arguments for icon kind `{_0}`")]
    BadArguments(#[error(not(source))] CompactString),
}

impl TryFrom<Vec<CompactString>> for Icon {
    type Error = IconError;

    fn try_from(parts: Vec<CompactString>) -> Result<Self, Self::Error> {
        let Some((kind, args)) = parts.split_first() else {
            return Err(IconError::Empty);
        };
        let bad_args = || IconError::BadArguments(kind.clone());
        let number = |s: &CompactString| {
            s.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite() && *x > 0.0)
                .ok_or_else(bad_args)
        };
        match (kind.as_str(), args) {
            ("defaultMarker", []) => Ok(Self::DefaultMarker),
            ("fromAsset", [name]) => Ok(Self::Asset {
                name: name.clone(),
                package: None,
            }),
            ("fromAsset", [name, package]) => Ok(Self::Asset {
                name: name.clone(),
                package: Some(package.clone()),
            }),
            ("fromAssetImage", [name, scale]) => Ok(Self::ScaledAsset {
                name: name.clone(),
                scale: number(scale)?,
            }),
            ("fromAssetImage", [name, width, height]) => Ok(Self::SizedAsset {
                name: name.clone(),
                width: number(width)?,
                height: number(height)?,
            }),
            ("defaultMarker" | "fromAsset" | "fromAssetImage", _) => Err(bad_args()),
            _ => Err(IconError::UnknownKind(kind.clone())),
        }
    }
}

impl From<Icon> for Vec<CompactString> {
    fn from(icon: Icon) -> Self {
        match icon {
            Icon::DefaultMarker => vec!["defaultMarker".into()],
            Icon::Asset { name, package } => {
                let mut parts = vec!["fromAsset".into(), name];
                parts.extend(package);
                parts
            }
            Icon::ScaledAsset { name, scale } => {
                vec!["fromAssetImage".into(), name, format_compact!("{scale}")]
            }
            Icon::SizedAsset {
                name,
                width,
                height,
            } => vec![
                "fromAssetImage".into(),
                name,
                format_compact!("{width}"),
                format_compact!("{height}"),
            ],
        }
    }
}
