/// Location redaction utilities for logging
///
/// Coordinates identify where a user lives. Logs keep enough precision to
/// debug provider issues (~11 km) without pinpointing a household.

use crate::geo::Coordinates;

/// Round both axes to one decimal place.
/// Example: (33.5883, -7.6114) -> "33.6, -7.6"
pub fn coordinates(coords: &Coordinates) -> String {
    format!("{:.1}, {:.1}", coords.latitude, coords.longitude)
}

/// Mask the query string of a URL, which carries the coordinates.
/// Example: "http://host/v1/calendar?latitude=33.58" -> "http://host/v1/calendar?***"
pub fn url(url: &str) -> String {
    match url.find('?') {
        Some(pos) => format!("{}?***", &url[..pos]),
        None => url.to_string(),
    }
}
