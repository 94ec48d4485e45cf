//! Imperial to metric conversion of free text.
//!
//! Runs on placeholder text only, so units inside tags such as
//! `{@item rope (50 feet)|phb}` are never touched.

use regex::{Captures, Regex};

pub trait UnitConverter {
    fn convert(&self, text: &str) -> String;
}

struct Unit {
    factor: f64,
    singular: &'static str,
    plural: &'static str,
}

pub struct MetricConverter {
    quantity_re: Regex,
}

impl Default for MetricConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricConverter {
    pub fn new() -> Self {
        Self {
            quantity_re: Regex::new(
                r"\b(\d+(?:[.,]\d+)?)([ -])(feet|foot|ft|miles?|pounds?|lbs?|inch(?:es)?|gallons?)\b",
            )
            .unwrap(),
        }
    }

    fn unit(name: &str) -> Option<Unit> {
        let unit = match name {
            // Rules round 5 ft squares to 1.5 m
            "feet" | "foot" => Unit {
                factor: 0.3,
                singular: "meter",
                plural: "meters",
            },
            "ft" => Unit {
                factor: 0.3,
                singular: "m",
                plural: "m",
            },
            "mile" | "miles" => Unit {
                factor: 1.5,
                singular: "kilometer",
                plural: "kilometers",
            },
            "pound" | "pounds" => Unit {
                factor: 0.5,
                singular: "kilogram",
                plural: "kilograms",
            },
            "lb" | "lbs" => Unit {
                factor: 0.5,
                singular: "kg",
                plural: "kg",
            },
            "inch" | "inches" => Unit {
                factor: 2.5,
                singular: "centimeter",
                plural: "centimeters",
            },
            "gallon" | "gallons" => Unit {
                factor: 4.0,
                singular: "liter",
                plural: "liters",
            },
            _ => return None,
        };
        Some(unit)
    }
}

impl UnitConverter for MetricConverter {
    fn convert(&self, text: &str) -> String {
        self.quantity_re
            .replace_all(text, |caps: &Captures| {
                let original = caps[0].to_string();
                let Ok(amount) = caps[1].replace(',', ".").parse::<f64>() else {
                    return original;
                };
                let Some(unit) = Self::unit(&caps[3]) else {
                    return original;
                };

                let converted = amount * unit.factor;
                // "a 10-foot pole" stays an adjective
                let name = if &caps[2] == "-" || converted == 1.0 {
                    unit.singular
                } else {
                    unit.plural
                };
                format!("{}{}{}", format_amount(converted), &caps[2], name)
            })
            .into_owned()
    }
}

fn format_amount(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}
