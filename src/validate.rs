//! Rule-based form validation.
//!
//! A field fails on its first failing rule. Empty values only go through
//! [`Rule::Required`]; every other rule accepts them, so optional fields
//! are expressed by leaving `Required` out.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::http::request::Request;

/// One check applied to a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Not empty after trimming
    Required,
    /// Looks like `local@domain.tld`
    Email,
    /// 9 to 15 digits, with optional leading `+`, spaces and dashes
    Phone,
    /// Character count within `min..=max`
    Length { min: usize, max: usize },
    /// Integer within `min..=max`
    IntRange { min: i64, max: i64 },
    /// Lowercase ASCII letters, digits and dashes, at most 100 characters
    Slug,
    /// Postal code shaped `NN-NNN`
    Postcode,
}

impl Rule {
    /// Error message when `value` breaks the rule.
    pub fn check(&self, value: &str) -> Option<String> {
        let ok = match self {
            Rule::Required => !value.trim().is_empty(),
            Rule::Email => is_email(value),
            Rule::Phone => is_phone(value),
            Rule::Postcode => is_postcode(value),
            Rule::Length { min, max } => {
                let len = value.chars().count();
                if len < *min {
                    return Some(format!("Must be at least {min} characters"));
                }
                if len > *max {
                    return Some(format!("Must be at most {max} characters"));
                }
                true
            }
            Rule::IntRange { min, max } => match value.trim().parse::<i64>() {
                Ok(n) if (*min..=*max).contains(&n) => true,
                Ok(_) => return Some(format!("Must be between {min} and {max}")),
                Err(_) => return Some("Must be a whole number".to_string()),
            },
            Rule::Slug => {
                if value.len() > 100 {
                    return Some("Slug is too long".to_string());
                }
                value
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
            }
        };

        if ok {
            return None;
        }
        Some(
            match self {
                Rule::Required => "This field is required",
                Rule::Email => "Invalid email address",
                Rule::Phone => "Invalid phone number",
                Rule::Slug => "Use lowercase letters, digits and dashes only",
                Rule::Postcode => "Postal code must look like 00-000",
                Rule::Length { .. } | Rule::IntRange { .. } => "Invalid value",
            }
            .to_string(),
        )
    }
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn is_phone(value: &str) -> bool {
    let rest = value.strip_prefix('+').unwrap_or(value);
    if !rest.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-') {
        return false;
    }
    let digits = rest.chars().filter(char::is_ascii_digit).count();
    (9..=15).contains(&digits)
}

fn is_postcode(value: &str) -> bool {
    match value.trim().split_once('-') {
        Some((head, tail)) => {
            head.len() == 2
                && tail.len() == 3
                && head.bytes().chain(tail.bytes()).all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Field name to first error message.
#[derive(Debug, Default, Clone, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", .0.len())]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Rules per field, checked in insertion order.
#[derive(Debug, Default, Clone)]
pub struct Rules {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push((name.to_string(), rules.into_iter().collect()));
        self
    }

    /// Checks every field, reading values through `lookup`.
    pub fn validate<'v, F>(&self, lookup: F) -> Result<(), ValidationErrors>
    where
        F: Fn(&str) -> Option<&'v str>,
    {
        let mut errors = BTreeMap::new();

        for (name, rules) in &self.fields {
            let value = lookup(name).unwrap_or("");
            let failed = rules
                .iter()
                .filter(|rule| **rule == Rule::Required || !value.is_empty())
                .find_map(|rule| rule.check(value));

            if let Some(message) = failed {
                errors.insert(name.clone(), message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Checks the posted form fields of `request`.
    pub fn validate_form(&self, request: &Request) -> Result<(), ValidationErrors> {
        self.validate(|name| request.form(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rules() {
        assert!(Rule::Email.check("a@b.com").is_none());
        assert!(Rule::Email.check("notanemail").is_some());
        assert!(Rule::Email.check("a@b").is_some());

        assert!(Rule::Phone.check("123456789").is_none());
        assert!(Rule::Phone.check("+48 123 456 789").is_none());
        assert!(Rule::Phone.check("12345").is_some());

        let length = Rule::Length { min: 3, max: 10 };
        assert!(length.check("hello").is_none());
        assert!(length.check("hi").is_some());
        assert!(length.check("very long text").is_some());

        let range = Rule::IntRange { min: 1, max: 10 };
        assert!(range.check("5").is_none());
        assert!(range.check("11").is_some());
        assert_eq!(range.check("abc").as_deref(), Some("Must be a whole number"));

        assert!(Rule::Slug.check("valid-slug").is_none());
        assert!(Rule::Slug.check("Invalid").is_some());
        assert!(Rule::Slug.check(&"a".repeat(101)).is_some());
    }

    #[test]
    fn postcodes() {
        assert_eq!(Rule::Postcode.check("30-002"), None);
        assert_eq!(Rule::Postcode.check(" 00-950 "), None);
        for bad in ["3002", "30002", "300-02", "3a-002", "30-0021", "30--02"] {
            assert!(Rule::Postcode.check(bad).is_some(), "{bad}");
        }

        let rules = Rules::new().field("postcode", [Rule::Postcode]);
        assert!(rules.validate(|_| Some("30-002")).is_ok());
        assert!(rules.validate(|_| None).is_ok());
        assert_eq!(
            rules.validate(|_| Some("3002")).unwrap_err().get("postcode"),
            Some("Postal code must look like 00-000")
        );
    }

    #[test]
    fn field_map() {
        let rules = Rules::new()
            .field("email", [Rule::Required, Rule::Email])
            .field("phone", [Rule::Phone])
            .field("nickname", [Rule::Length { min: 3, max: 20 }]);

        let input = [("email", "bad"), ("phone", "12345"), ("nickname", "")];
        let errors = rules
            .validate(|name| input.iter().find(|(k, _)| *k == name).map(|(_, v)| *v))
            .unwrap_err();

        assert_eq!(errors.get("email"), Some("Invalid email address"));
        assert_eq!(errors.get("phone"), Some("Invalid phone number"));
        assert_eq!(errors.get("nickname"), None);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn required_reports_first() {
        let rules = Rules::new().field("email", [Rule::Required, Rule::Email]);
        let errors = rules.validate(|_| None).unwrap_err();
        assert_eq!(errors.get("email"), Some("This field is required"));
    }
}
