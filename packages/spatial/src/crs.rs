//! Coordinate reference systems and reprojection.
//!
//! Supports the handful of EPSG codes the datasets actually use: WGS 84 and
//! SIRGAS 2000 geographic coordinates, and their UTM zones. UTM uses the
//! Krüger n-series transverse Mercator (4th order), accurate to about a
//! millimetre inside a zone. WGS 84 and SIRGAS 2000 are treated as the
//! same datum.

use std::fmt;
use std::str::FromStr;

use geo::{Coord, MapCoords, MultiPolygon};

use crate::SpatialError;

/// UTM central meridian scale factor.
const UTM_SCALE_FACTOR: f64 = 0.9996;
/// UTM false easting in metres.
const UTM_FALSE_EASTING: f64 = 500_000.0;
/// UTM false northing for southern-hemisphere zones, in metres.
const UTM_SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;

/// A reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Semi-major axis in metres.
    pub semi_major_axis: f64,
    /// Inverse flattening.
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Self = Self {
        semi_major_axis: 6_378_137.0,
        inverse_flattening: 298.257_223_563,
    };

    /// Used by SIRGAS 2000.
    pub const GRS80: Self = Self {
        semi_major_axis: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    fn flattening(self) -> f64 {
        1.0 / self.inverse_flattening
    }
}

/// A supported coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crs {
    /// Longitude/latitude in degrees (x = longitude).
    Geographic {
        /// EPSG code.
        epsg: u32,
    },
    /// Universal Transverse Mercator, metres.
    Utm {
        /// EPSG code.
        epsg: u32,
        /// UTM zone number, 1-60.
        zone: u8,
        /// Southern hemisphere (10 000 km false northing).
        south: bool,
        /// Ellipsoid the projection is computed on.
        ellipsoid: Ellipsoid,
    },
}

impl Crs {
    /// WGS 84 geographic coordinates, the `GeoJSON` default.
    pub const WGS84: Self = Self::Geographic { epsg: 4326 };

    /// Resolves an EPSG code.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] for codes outside the
    /// supported set.
    pub fn from_epsg(epsg: u32) -> Result<Self, SpatialError> {
        #[allow(clippy::cast_possible_truncation)]
        let utm = |zone: u32, south: bool, ellipsoid: Ellipsoid| Self::Utm {
            epsg,
            zone: zone as u8,
            south,
            ellipsoid,
        };

        match epsg {
            4326 | 4674 => Ok(Self::Geographic { epsg }),
            32601..=32660 => Ok(utm(epsg - 32600, false, Ellipsoid::WGS84)),
            32701..=32760 => Ok(utm(epsg - 32700, true, Ellipsoid::WGS84)),
            // SIRGAS 2000 / UTM zone 11N..22N
            31965..=31976 => Ok(utm(epsg - 31954, false, Ellipsoid::GRS80)),
            // SIRGAS 2000 / UTM zone 17S..25S
            31977..=31985 => Ok(utm(epsg - 31960, true, Ellipsoid::GRS80)),
            _ => Err(SpatialError::UnsupportedCrs {
                code: format!("EPSG:{epsg}"),
            }),
        }
    }

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        match self {
            Self::Geographic { epsg } | Self::Utm { epsg, .. } => epsg,
        }
    }

    /// Whether coordinates are planar metres suitable for area math.
    #[must_use]
    pub const fn is_projected(self) -> bool {
        matches!(self, Self::Utm { .. })
    }

    /// Returns `self` if it is projected.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NotProjected`] for geographic systems.
    pub fn require_projected(self) -> Result<Self, SpatialError> {
        if self.is_projected() {
            Ok(self)
        } else {
            Err(SpatialError::NotProjected {
                code: self.to_string(),
            })
        }
    }

    /// Returns `self` if it is geographic.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NotGeographic`] for projected systems.
    pub fn require_geographic(self) -> Result<Self, SpatialError> {
        if self.is_projected() {
            Err(SpatialError::NotGeographic {
                code: self.to_string(),
            })
        } else {
            Ok(self)
        }
    }

    /// Transforms a single coordinate from `self` into `target`.
    #[must_use]
    pub fn transform_coord(self, target: Self, coord: Coord<f64>) -> Coord<f64> {
        if self.epsg() == target.epsg() {
            return coord;
        }
        let lon_lat = projection_of(self).map_or(coord, |tm| tm.inverse(coord));
        projection_of(target).map_or(lon_lat, |tm| tm.forward(lon_lat))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = SpatialError;

    /// Accepts `EPSG:31979`, `epsg:31979`, `31979`,
    /// `urn:ogc:def:crs:EPSG::31979` and the `OGC:CRS84` aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self::WGS84);
        }

        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG") || !upper.contains(':'))
            .and_then(|code| code.parse::<u32>().ok())
            .ok_or_else(|| SpatialError::UnsupportedCrs {
                code: trimmed.to_string(),
            })?;

        Self::from_epsg(code)
    }
}

/// Reprojects a geometry between two systems. Returns a clone when the
/// systems are the same.
#[must_use]
pub fn reproject(geometry: &MultiPolygon<f64>, from: Crs, to: Crs) -> MultiPolygon<f64> {
    if from.epsg() == to.epsg() {
        return geometry.clone();
    }

    let inverse = projection_of(from);
    let forward = projection_of(to);
    let inverse = inverse.as_ref();
    let forward = forward.as_ref();

    geometry.map_coords(|coord| {
        let lon_lat = inverse.map_or(coord, |tm| tm.inverse(coord));
        forward.map_or(lon_lat, |tm| tm.forward(lon_lat))
    })
}

fn projection_of(crs: Crs) -> Option<TransverseMercator> {
    match crs {
        Crs::Geographic { .. } => None,
        Crs::Utm {
            zone,
            south,
            ellipsoid,
            ..
        } => Some(TransverseMercator::utm(zone, south, ellipsoid)),
    }
}

/// Precomputed Krüger series constants for one transverse Mercator zone.
#[derive(Debug, Clone, Copy)]
struct TransverseMercator {
    central_meridian: f64,
    false_northing: f64,
    /// `k0 * A`, the scaled rectifying radius.
    scaled_radius: f64,
    eccentricity: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
}

impl TransverseMercator {
    fn utm(zone: u8, south: bool, ellipsoid: Ellipsoid) -> Self {
        let f = ellipsoid.flattening();
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        let rectifying_radius =
            ellipsoid.semi_major_axis / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

        Self {
            central_meridian: f64::from(zone).mul_add(6.0, -183.0),
            false_northing: if south { UTM_SOUTH_FALSE_NORTHING } else { 0.0 },
            scaled_radius: UTM_SCALE_FACTOR * rectifying_radius,
            eccentricity: 2.0 * n.sqrt() / (1.0 + n),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
                61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
                49_561.0 * n4 / 161_280.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
                n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
                17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
                4397.0 * n4 / 161_280.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
                56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
                4279.0 * n4 / 630.0,
            ],
        }
    }

    /// lon/lat degrees -> easting/northing metres.
    fn forward(&self, coord: Coord<f64>) -> Coord<f64> {
        let phi = coord.y.to_radians();
        let lambda = (coord.x - self.central_meridian).to_radians();
        let e = self.eccentricity;

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / t.hypot(1.0)).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = series_multiplier(j);
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        Coord {
            x: self.scaled_radius.mul_add(eta, UTM_FALSE_EASTING),
            y: self.scaled_radius.mul_add(xi, self.false_northing),
        }
    }

    /// easting/northing metres -> lon/lat degrees.
    fn inverse(&self, coord: Coord<f64>) -> Coord<f64> {
        let xi = (coord.y - self.false_northing) / self.scaled_radius;
        let eta = (coord.x - UTM_FALSE_EASTING) / self.scaled_radius;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = series_multiplier(j);
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            phi += delta * (series_multiplier(j) * chi).sin();
        }
        let lambda = eta_prime.sinh().atan2(xi_prime.cos());

        Coord {
            x: self.central_meridian + lambda.to_degrees(),
            y: phi.to_degrees(),
        }
    }
}

/// `2j` for the 1-based series index `j`.
#[allow(clippy::cast_precision_loss)]
const fn series_multiplier(index: usize) -> f64 {
    2.0 * (index + 1) as f64
}
