//! Real Las Vegas / Henderson delivery sites.
//!
//! Coordinates sourced from OpenStreetMap. Sites within a neighbourhood sit
//! well inside a 2 km radius; neighbourhoods are 10 km or more apart.

use delivery_planner::models::Coordinate;

/// A named delivery site.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lon: f64) -> Self {
        Self { name, lat, lon }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Warehouse on the central Strip.
pub const DEPOT: Site = Site::new("Central Strip Warehouse", 36.1147, -115.1728);

// ============================================================================
// North Strip (around Wynn / Encore)
// ============================================================================

pub const NORTH_STRIP: &[Site] = &[
    Site::new("Wynn Las Vegas", 36.1263781, -115.1658180),
    Site::new("SW Steakhouse", 36.1262145, -115.1669146),
    Site::new("Sinatra", 36.1300035, -115.1654850),
    Site::new("Encore at Wynn", 36.1289345, -115.1653620),
];

// ============================================================================
// East Las Vegas
// ============================================================================

pub const EAST_SIDE: &[Site] = &[
    Site::new("Rivas Mexican Grill", 36.1450055, -115.0482587),
    Site::new("Roberto's Taco Shop", 36.1452953, -115.0478347),
    Site::new("Monarca Mexican Restaurant", 36.1440711, -115.0634197),
    Site::new("La Costa del Sol", 36.1470458, -115.0644345),
];

// ============================================================================
// Henderson
// ============================================================================

pub const HENDERSON: &[Site] = &[
    Site::new("I Love Sushi Henderson", 35.9916660, -115.1028343),
    Site::new("RibCage", 35.9949754, -115.0999810),
];

/// Every site, neighbourhood by neighbourhood.
pub fn all_sites() -> Vec<Site> {
    NORTH_STRIP.iter().chain(EAST_SIDE).chain(HENDERSON).copied().collect()
}
