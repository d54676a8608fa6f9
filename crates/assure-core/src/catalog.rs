//! The closed product/tier/slot catalog (spec §3).
//!
//! Kept as static data rather than loaded from a config file: the set of
//! products, tiers, and required slots is fixed by this specification, not
//! by a deployment-time YAML file, so there's nothing to "load" — the
//! catalog itself is the configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    Travel,
    Maid,
    Car,
    PersonalAccident,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::Travel,
        Product::Maid,
        Product::Car,
        Product::PersonalAccident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Travel => "Travel",
            Product::Maid => "Maid",
            Product::Car => "Car",
            Product::PersonalAccident => "PersonalAccident",
        }
    }

    /// Case-insensitive parse against the canonical product names.
    pub fn parse(s: &str) -> Option<Product> {
        let s = s.trim();
        Product::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
    }

    pub fn tiers(&self) -> &'static [&'static str] {
        match self {
            Product::Travel => &["Basic", "Silver", "Gold", "Platinum"],
            Product::Maid => &["Basic", "Enhanced", "Premier", "Exclusive"],
            Product::Car => &[],
            Product::PersonalAccident => &["Bronze", "Silver", "Premier", "Platinum"],
        }
    }

    pub fn required_slots(&self) -> &'static [&'static str] {
        match self {
            Product::Travel => &[
                "destination",
                "travel_duration",
                "pre_existing_medical_condition",
                "plan_preference",
            ],
            Product::Maid => &[
                "duration_of_insurance",
                "maid_country",
                "coverage_above_mom_minimum",
                "add_ons",
            ],
            Product::Car => &[],
            Product::PersonalAccident => &["coverage_scope", "risk_level", "desired_amount"],
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of value a recommendation slot expects — guides the extractor and
/// the question-asker prompts (spec §4.8 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Value,
    YesNo,
    Choice,
}

#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: &'static str,
    pub kind: SlotKind,
    pub options: &'static [&'static str],
    pub format_hint: &'static str,
    pub fallback_question: &'static str,
}

pub fn slot_spec(product: Product, slot: &str) -> Option<&'static SlotSpec> {
    slot_specs(product).iter().find(|s| s.name == slot)
}

pub fn slot_specs(product: Product) -> &'static [SlotSpec] {
    match product {
        Product::Travel => &TRAVEL_SLOTS,
        Product::Maid => &MAID_SLOTS,
        Product::Car => &[],
        Product::PersonalAccident => &PA_SLOTS,
    }
}

static TRAVEL_SLOTS: [SlotSpec; 4] = [
    SlotSpec {
        name: "destination",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "a country or region name",
        fallback_question: "Where are you travelling to?",
    },
    SlotSpec {
        name: "travel_duration",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "number of days",
        fallback_question: "How many days is your trip?",
    },
    SlotSpec {
        name: "pre_existing_medical_condition",
        kind: SlotKind::YesNo,
        options: &["yes", "no"],
        format_hint: "yes or no",
        fallback_question: "Do you have any pre-existing medical conditions?",
    },
    SlotSpec {
        name: "plan_preference",
        kind: SlotKind::Choice,
        options: &["budget", "comprehensive"],
        format_hint: "budget or comprehensive",
        fallback_question: "Would you prefer a budget or a comprehensive plan?",
    },
];

static MAID_SLOTS: [SlotSpec; 4] = [
    SlotSpec {
        name: "duration_of_insurance",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "number of months",
        fallback_question: "How many months of coverage do you need?",
    },
    SlotSpec {
        name: "maid_country",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "country of origin",
        fallback_question: "What is your maid's country of origin?",
    },
    SlotSpec {
        name: "coverage_above_mom_minimum",
        kind: SlotKind::YesNo,
        options: &["yes", "no"],
        format_hint: "yes or no",
        fallback_question: "Would you like coverage above the MOM-mandated minimum?",
    },
    SlotSpec {
        name: "add_ons",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "comma-separated add-ons, or 'none'",
        fallback_question: "Would you like any add-ons, or none?",
    },
];

static PA_SLOTS: [SlotSpec; 3] = [
    SlotSpec {
        name: "coverage_scope",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "free text description",
        fallback_question: "What scope of coverage are you looking for?",
    },
    SlotSpec {
        name: "risk_level",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "free text description",
        fallback_question: "How would you describe your risk level (e.g. occupation)?",
    },
    SlotSpec {
        name: "desired_amount",
        kind: SlotKind::Value,
        options: &[],
        format_hint: "a coverage amount in SGD between 500 and 3500",
        fallback_question: "What coverage amount are you looking for (SGD 500-3500)?",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Product::parse("travel"), Some(Product::Travel));
        assert_eq!(Product::parse("MAID"), Some(Product::Maid));
        assert_eq!(Product::parse("unknown"), None);
    }

    #[test]
    fn car_has_no_tiers_or_slots() {
        assert!(Product::Car.tiers().is_empty());
        assert!(Product::Car.required_slots().is_empty());
    }

    #[test]
    fn every_required_slot_has_a_spec() {
        for product in Product::ALL {
            for slot in product.required_slots() {
                assert!(
                    slot_spec(product, slot).is_some(),
                    "missing slot spec for {product}/{slot}"
                );
            }
        }
    }
}
