//! The graph's spatial extent, tightened monotonically as nodes are set.

/// A lat/lon bounding box that only ever grows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
        }
    }
}

impl BoundingBox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_box_reports_empty() {
        assert!(BoundingBox::new().is_empty());
    }

    #[test]
    fn expand_tightens_monotonically() {
        let mut bbox = BoundingBox::new();
        bbox.expand(45.0, -122.0);
        bbox.expand(46.0, -123.0);
        bbox.expand(44.5, -121.0);
        assert_eq!(bbox.min_lat, 44.5);
        assert_eq!(bbox.max_lat, 46.0);
        assert_eq!(bbox.min_lon, -123.0);
        assert_eq!(bbox.max_lon, -121.0);
    }
}
