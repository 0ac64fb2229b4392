//! Passenger-type cost allocation for one package.
//!
//! A package's cost structure mixes currencies: air fare and Bangladesh-side
//! fees are already BDT, hotel nights and Saudi-side fees are SAR and go
//! through the package's recorded exchange rate. Shared (flat) costs are
//! added identically to every passenger category — they are not prorated by
//! headcount; the result is a price-per-person figure, and callers multiply
//! by assigned headcount themselves. No input can make allocation fail:
//! every absent or malformed field resolves to zero.

use serde::Serialize;
use serde_json::Value;

use crate::currency::MoneyFigure;
use crate::records::{resolve_path, value_str};

/// Exchange-rate field variants on a package record.
pub const EXCHANGE_RATE_FIELDS: &[&str] = &["exchangeRate", "sarToBdtRate", "riyalRate"];

/// Flat Bangladesh-side fees, in BDT.
const LOCAL_FEE_FIELDS: &[&str] = &[
    "visaFee",
    "idCardFee",
    "insuranceFee",
    "trainingFee",
    "transportFee",
];

/// Flat Saudi-side fees, in SAR.
const SAUDI_FEE_FIELDS: &[&str] = &[
    "guideFee",
    "campFee",
    "foodFee",
    "groundServiceFee",
    "ziyaraFee",
    "muallemFee",
];

/// A package carries up to 5 named hotel slots; anything beyond is ignored.
const MAX_HOTEL_SLOTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

impl PassengerType {
    pub const ALL: [PassengerType; 3] = [Self::Adult, Self::Child, Self::Infant];

    /// Tag on a customer record; anything absent or unrecognized is an adult.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "child" => Self::Child,
            "infant" => Self::Infant,
            _ => Self::Adult,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Adult => 0,
            Self::Child => 1,
            Self::Infant => 2,
        }
    }

    fn air_fare_paths(self) -> &'static [&'static str] {
        match self {
            Self::Adult => &["airFare.adult", "adultAirFare"],
            Self::Child => &["airFare.child", "childAirFare"],
            Self::Infant => &["airFare.infant", "infantAirFare"],
        }
    }

    fn hotel_price_paths(self) -> &'static [&'static str] {
        match self {
            Self::Adult => &["rates.adult.price", "adultPrice"],
            Self::Child => &["rates.child.price", "childPrice"],
            Self::Infant => &["rates.infant.price", "infantPrice"],
        }
    }

    fn hotel_nights_paths(self) -> &'static [&'static str] {
        match self {
            Self::Adult => &["rates.adult.nights", "adultNights"],
            Self::Child => &["rates.child.nights", "childNights"],
            Self::Infant => &["rates.infant.nights", "infantNights"],
        }
    }

    fn discount_paths(self) -> &'static [&'static str] {
        match self {
            Self::Adult => &["discount.adult", "adultDiscount"],
            Self::Child => &["discount.child", "childDiscount"],
            Self::Infant => &["discount.infant", "infantDiscount"],
        }
    }
}

/// Per-person BDT totals after allocation and discount; each is ≥ 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerTypeTotals {
    pub adult: f64,
    pub child: f64,
    pub infant: f64,
}

impl PassengerTypeTotals {
    pub fn get(&self, passenger_type: PassengerType) -> f64 {
        match passenger_type {
            PassengerType::Adult => self.adult,
            PassengerType::Child => self.child,
            PassengerType::Infant => self.infant,
        }
    }

    fn set(&mut self, passenger_type: PassengerType, value: f64) {
        match passenger_type {
            PassengerType::Adult => self.adult = value,
            PassengerType::Child => self.child = value,
            PassengerType::Infant => self.infant = value,
        }
    }

    /// Line total for a set of assigned headcounts (per-unit price × count).
    pub fn total_for_headcounts(&self, adults: u64, children: u64, infants: u64) -> f64 {
        self.adult * adults as f64 + self.child * children as f64 + self.infant * infants as f64
    }
}

/// One package's cost structure, extracted from the raw record and already
/// converted to BDT. Read-only to the engine; the package-edit workflow owns
/// the source fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PackageCostSpec {
    /// Air fare per category, BDT.
    air_fare: [f64; 3],
    /// Hotel cost per category (price × nights summed over slots), BDT.
    hotel_cost: [f64; 3],
    /// Flat fees added identically to every category, BDT.
    shared_costs: f64,
    /// Discount per category, BDT.
    discount: [f64; 3],
}

impl PackageCostSpec {
    pub fn from_record(package: &Value) -> Self {
        let rate = resolve_path(package, EXCHANGE_RATE_FIELDS);

        let local_fees: f64 = LOCAL_FEE_FIELDS
            .iter()
            .copied()
            .map(|field| resolve_path(package, &[field]))
            .sum();
        let saudi_fees: f64 = SAUDI_FEE_FIELDS
            .iter()
            .copied()
            .map(|field| resolve_path(package, &[field]))
            .sum();

        let hotels: &[Value] = package
            .get("hotels")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut spec = Self {
            shared_costs: local_fees + MoneyFigure::sar(saudi_fees).to_local(rate).amount,
            ..Self::default()
        };

        for passenger_type in PassengerType::ALL {
            let slot = passenger_type.index();
            spec.air_fare[slot] = resolve_path(package, passenger_type.air_fare_paths());
            for hotel in hotels.iter().take(MAX_HOTEL_SLOTS) {
                let price = resolve_path(hotel, passenger_type.hotel_price_paths());
                let nights = resolve_path(hotel, passenger_type.hotel_nights_paths());
                spec.hotel_cost[slot] += MoneyFigure::sar(price * nights).to_local(rate).amount;
            }
            spec.discount[slot] = resolve_path(package, passenger_type.discount_paths());
        }

        spec
    }

    /// Per-category price-per-person: air fare + hotel cost + shared costs,
    /// minus the category discount, clamped at zero.
    pub fn allocate(&self) -> PassengerTypeTotals {
        let mut totals = PassengerTypeTotals::default();
        for passenger_type in PassengerType::ALL {
            let slot = passenger_type.index();
            let subtotal = self.air_fare[slot] + self.hotel_cost[slot] + self.shared_costs;
            totals.set(passenger_type, (subtotal - self.discount[slot]).max(0.0));
        }
        totals
    }
}

/// Allocate a raw package record's costs across passenger categories.
pub fn allocate_package_costs(package: &Value) -> PassengerTypeTotals {
    PackageCostSpec::from_record(package).allocate()
}

/// The passenger type tagged on a customer record.
pub fn customer_passenger_type(customer: &Value) -> PassengerType {
    PassengerType::from_tag(&value_str(customer, "passengerType"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{allocate_package_costs, customer_passenger_type, PassengerType};

    #[test]
    fn air_hotel_and_shared_costs_combine() {
        // adult = 500 air + 100 SAR × 3 nights × 25 + 200 visa = 8200
        let package = json!({
            "airFare": { "adult": 500 },
            "hotels": [
                { "rates": { "adult": { "price": 100, "nights": 3 } } }
            ],
            "exchangeRate": 25,
            "visaFee": 200
        });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.adult, 8200.0);
        // child and infant still get the shared visa fee: price-per-person,
        // not a line total.
        assert_eq!(totals.child, 200.0);
        assert_eq!(totals.infant, 200.0);
    }

    #[test]
    fn saudi_fees_are_converted_local_fees_are_not() {
        let package = json!({
            "exchangeRate": 30,
            "visaFee": "1,000",
            "guideFee": 50,
            "foodFee": 10
        });
        let totals = allocate_package_costs(&package);
        // 1000 BDT + (50 + 10) SAR × 30 on every category
        assert_eq!(totals.adult, 2800.0);
        assert_eq!(totals.child, 2800.0);
        assert_eq!(totals.infant, 2800.0);
    }

    #[test]
    fn missing_rate_degrades_to_identity() {
        let package = json!({
            "hotels": [ { "rates": { "adult": { "price": 120, "nights": 2 } } } ],
            "guideFee": 60
        });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.adult, 300.0);
    }

    #[test]
    fn saudi_figures_never_go_negative() {
        // A negative SAR fee (bad data entry) clamps to zero instead of
        // subtracting from every category.
        let package = json!({
            "exchangeRate": 25,
            "guideFee": -50,
            "visaFee": 300
        });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.adult, 300.0);
        assert_eq!(totals.infant, 300.0);
    }

    #[test]
    fn discounts_clamp_at_zero() {
        let package = json!({
            "airFare": { "child": 400 },
            "discount": { "child": 10_000, "adult": 50 }
        });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.child, 0.0);
        assert_eq!(totals.adult, 0.0);
        assert_eq!(totals.infant, 0.0);
    }

    #[test]
    fn legacy_flat_fields_still_resolve() {
        let package = json!({
            "adultAirFare": "5,500 BDT",
            "hotels": [ { "adultPrice": 80, "adultNights": 4 } ],
            "riyalRate": 20,
            "adultDiscount": 100
        });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.adult, 5500.0 + 80.0 * 4.0 * 20.0 - 100.0);
    }

    #[test]
    fn only_five_hotel_slots_count() {
        let slot = json!({ "rates": { "adult": { "price": 10, "nights": 1 } } });
        let package = json!({
            "hotels": vec![slot; 7],
            "exchangeRate": 1
        });
        assert_eq!(allocate_package_costs(&package).adult, 50.0);
    }

    #[test]
    fn empty_package_allocates_to_zero() {
        let totals = allocate_package_costs(&json!({}));
        assert_eq!(totals.adult, 0.0);
        assert_eq!(totals.child, 0.0);
        assert_eq!(totals.infant, 0.0);
    }

    #[test]
    fn headcount_totals_multiply_per_unit_prices() {
        let package = json!({ "airFare": { "adult": 100, "child": 60, "infant": 10 } });
        let totals = allocate_package_costs(&package);
        assert_eq!(totals.total_for_headcounts(2, 1, 1), 270.0);
    }

    #[test]
    fn passenger_tags_default_to_adult() {
        assert_eq!(
            customer_passenger_type(&json!({ "passengerType": "CHILD" })),
            PassengerType::Child
        );
        assert_eq!(
            customer_passenger_type(&json!({ "passengerType": "infant " })),
            PassengerType::Infant
        );
        assert_eq!(
            customer_passenger_type(&json!({ "passengerType": "senior" })),
            PassengerType::Adult
        );
        assert_eq!(customer_passenger_type(&json!({})), PassengerType::Adult);
    }
}
