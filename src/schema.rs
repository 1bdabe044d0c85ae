//! Static schema registry for the booking workbook.
//!
//! The required column list per sheet is maintained here, outside the
//! store itself. Each booking category maps to one sheet whose columns are
//! the common field set followed by category-specific fields.

use serde::{Deserialize, Serialize};

/// Column holding the business key of every booking record.
pub const KEY_COLUMN: &str = "Booking ID";

/// Distinguished non-booking sheet recording the last save time.
pub const META_SHEET: &str = "_Meta";

/// Columns of the metadata sheet: last-updated date and time.
pub const META_COLUMNS: [&str; 2] = ["Updated On", "Updated At"];

/// Fields shared by every booking category, in sheet order.
pub const COMMON_COLUMNS: &[&str] = &[
    KEY_COLUMN,
    "Booking Type",
    "Client Name",
    "Client Contact",
    "Passengers",
    "Booking Date",
    "Travel Start Date",
    "Travel End Date",
    "Total Amount",
    "Currency",
    "Vendor",
    "Status",
    "Remarks",
];

const FLIGHT_COLUMNS: &[&str] = &[
    "Airline",
    "Flight Number",
    "From Airport",
    "To Airport",
    "Departure",
    "Arrival",
    "Cabin Class",
    "Ticket Number",
];

const HOTEL_COLUMNS: &[&str] = &[
    "City",
    "Hotel Name",
    "Check-in Date",
    "Check-out Date",
    "Nights",
    "Room Type",
    "Confirmation Number",
];

const TRAIN_COLUMNS: &[&str] = &[
    "Train Name",
    "Train Number",
    "From Station",
    "To Station",
    "Departure",
    "Class",
    "Coach",
    "Seat/Berth",
];

const BUS_COLUMNS: &[&str] = &[
    "Operator",
    "From City",
    "To City",
    "Departure",
    "Seat Number",
    "Bus Type",
];

/// One sheet per booking category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingCategory {
    Flight,
    Hotel,
    Train,
    Bus,
}

impl BookingCategory {
    pub const ALL: [BookingCategory; 4] = [
        BookingCategory::Flight,
        BookingCategory::Hotel,
        BookingCategory::Train,
        BookingCategory::Bus,
    ];

    pub fn sheet_name(&self) -> &'static str {
        match self {
            BookingCategory::Flight => "Flight",
            BookingCategory::Hotel => "Hotel",
            BookingCategory::Train => "Train",
            BookingCategory::Bus => "Bus",
        }
    }

    /// Two-letter prefix used when generating booking ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            BookingCategory::Flight => "FL",
            BookingCategory::Hotel => "HT",
            BookingCategory::Train => "TR",
            BookingCategory::Bus => "BS",
        }
    }

    pub fn from_sheet(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.sheet_name() == name)
    }

    /// Required columns for this category's sheet: common fields first,
    /// then the category-specific ones.
    pub fn columns(&self) -> Vec<String> {
        let specific = match self {
            BookingCategory::Flight => FLIGHT_COLUMNS,
            BookingCategory::Hotel => HOTEL_COLUMNS,
            BookingCategory::Train => TRAIN_COLUMNS,
            BookingCategory::Bus => BUS_COLUMNS,
        };
        COMMON_COLUMNS
            .iter()
            .chain(specific.iter())
            .map(|c| (*c).to_string())
            .collect()
    }
}

/// Sheet names of all booking categories, in registry order.
pub fn booking_sheets() -> Vec<&'static str> {
    BookingCategory::ALL.iter().map(|c| c.sheet_name()).collect()
}

/// Required column list for a sheet, if the sheet is registered.
pub fn required_columns(sheet: &str) -> Option<Vec<String>> {
    BookingCategory::from_sheet(sheet).map(|c| c.columns())
}

/// Booking id prefix for a sheet. Unregistered sheets fall back to the
/// first two letters of their name, or `BK` when the name is too short.
pub fn id_prefix(sheet: &str) -> String {
    if let Some(category) = BookingCategory::from_sheet(sheet) {
        return category.id_prefix().to_string();
    }
    let letters: String = sheet
        .chars()
        .filter(|c| c.is_alphabetic())
        .take(2)
        .collect::<String>()
        .to_uppercase();
    if letters.len() == 2 {
        letters
    } else {
        "BK".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_starts_with_common_columns() {
        for category in BookingCategory::ALL {
            let columns = category.columns();
            for (i, common) in COMMON_COLUMNS.iter().enumerate() {
                assert_eq!(columns[i], *common);
            }
            assert!(columns.len() > COMMON_COLUMNS.len());
        }
    }

    #[test]
    fn columns_are_unique_within_a_sheet() {
        for category in BookingCategory::ALL {
            let columns = category.columns();
            let mut seen = std::collections::HashSet::new();
            for column in &columns {
                assert!(seen.insert(column.clone()), "duplicate column {column}");
            }
        }
    }

    #[test]
    fn id_prefix_falls_back_for_unregistered_sheets() {
        assert_eq!(id_prefix("Flight"), "FL");
        assert_eq!(id_prefix("Bus"), "BS");
        assert_eq!(id_prefix("Cruise"), "CR");
        assert_eq!(id_prefix("X"), "BK");
    }
}
