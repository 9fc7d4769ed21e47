//! Synthetic test data
//!
//! Every record that ends up creating remote state carries an email that is
//! unique for the lifetime of the target's user table. Uniqueness comes from
//! a millisecond timestamp, a process-wide monotonic counter and a short
//! random suffix. Callers must never reuse a literal email across runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::{pick_country, BirthDate, Title};

/// Shared across generator instances so two generators in one process can
/// never hand out the same token.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Carla", "Diego", "Elena", "Felix", "Gisele", "Hugo", "Iris", "Joao",
    "Karin", "Leo", "Marta", "Nico", "Olga", "Pedro", "Rita", "Sergio", "Tania", "Vitor",
];

const LAST_NAMES: &[&str] = &[
    "Almeida", "Barros", "Costa", "Duarte", "Esteves", "Ferreira", "Gomes", "Henriques",
    "Lopes", "Moreira", "Nunes", "Oliveira", "Pereira", "Queiroz", "Ribeiro", "Silva",
];

const COMPANIES: &[&str] = &[
    "Acme Testing", "Northwind Labs", "Blue Harbor", "Quality Works", "Pixel Forge",
    "Greenfield Supply", "Summit Analytics",
];

const STREETS: &[&str] = &[
    "Maple Street", "Harbor Road", "King Avenue", "Elm Lane", "Station Road", "Bay Street",
];

const CITIES: &[&str] = &[
    "Toronto", "Ottawa", "Vancouver", "Sydney", "Los Angeles", "Singapore", "Auckland",
];

const STATES: &[&str] = &[
    "Ontario", "Quebec", "California", "New South Wales", "Texas", "Victoria",
];

const WORDS: &[&str] = &[
    "order", "delivery", "product", "question", "invoice", "catalog", "support", "return",
    "shipping", "account", "payment", "size", "stock", "feedback", "discount", "warranty",
];

const TRANSACTION_DESCRIPTIONS: &[&str] = &[
    "Allowance", "Salary", "Groceries", "Rent", "Freelance", "Electricity", "Internet",
];

/// A user able to register on the storefront
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub title: Title,
    pub birth_date: BirthDate,
    #[serde(default)]
    pub newsletter: bool,
    #[serde(default)]
    pub offers: bool,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: String,
    pub address: String,
    pub country: String,
    pub state: String,
    pub city: String,
    pub zipcode: String,
    pub mobile_number: String,
}

/// A contact-form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    /// Local file to upload with the form
    #[serde(default)]
    pub attachment: Option<PathBuf>,
}

/// An entry for the finance tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub description: String,
    pub amount: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

/// Any record that can be bound to an alias inside a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fixture {
    User(UserRecord),
    Contact(ContactRecord),
    Transaction(TransactionRecord),
}

impl Fixture {
    pub fn kind(&self) -> &'static str {
        match self {
            Fixture::User(_) => "user",
            Fixture::Contact(_) => "contact",
            Fixture::Transaction(_) => "transaction",
        }
    }

    /// Look up a field by its snake_case name, for template interpolation.
    pub fn field(&self, field: &str) -> Result<String> {
        let value = match self {
            Fixture::User(u) => match field {
                "name" => Some(u.name.clone()),
                "email" => Some(u.email.clone()),
                "password" => Some(u.password.clone()),
                "title" => Some(u.title.as_str().to_string()),
                "birth_day" => Some(u.birth_date.day.clone()),
                "birth_month" => Some(u.birth_date.month.clone()),
                "birth_year" => Some(u.birth_date.year.clone()),
                "first_name" => Some(u.first_name.clone()),
                "last_name" => Some(u.last_name.clone()),
                "company" => Some(u.company.clone()),
                "address" => Some(u.address.clone()),
                "country" => Some(u.country.clone()),
                "state" => Some(u.state.clone()),
                "city" => Some(u.city.clone()),
                "zipcode" => Some(u.zipcode.clone()),
                "mobile_number" => Some(u.mobile_number.clone()),
                _ => None,
            },
            Fixture::Contact(c) => match field {
                "name" => Some(c.name.clone()),
                "email" => Some(c.email.clone()),
                "subject" => Some(c.subject.clone()),
                "message" => Some(c.message.clone()),
                "attachment" => c
                    .attachment
                    .as_ref()
                    .map(|p| p.to_string_lossy().to_string()),
                _ => None,
            },
            Fixture::Transaction(t) => match field {
                "description" => Some(t.description.clone()),
                "amount" => Some(t.amount.clone()),
                "date" => Some(t.date.clone()),
                _ => None,
            },
        };

        value.ok_or_else(|| Error::UnknownField {
            record: self.kind().to_string(),
            field: field.to_string(),
        })
    }
}

/// Produces fresh, practically unique records
#[derive(Debug, Clone)]
pub struct FixtureGenerator {
    /// Domain used for generated user emails
    user_domain: String,
    /// Domain used for generated contact emails
    contact_domain: String,
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new("automation.test", "contact.test")
    }
}

impl FixtureGenerator {
    pub fn new(user_domain: impl Into<String>, contact_domain: impl Into<String>) -> Self {
        Self {
            user_domain: user_domain.into(),
            contact_domain: contact_domain.into(),
        }
    }

    /// A token that is unique within this process and practically unique
    /// across runs: `<millis><sequence><random>`.
    pub fn unique_token(&self) -> String {
        let millis = Utc::now().timestamp_millis();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(4)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        format!("{millis}{seq:04}{suffix}")
    }

    /// An email of the form `<seed>.<token>@<domain>`.
    pub fn unique_email(&self, seed: &str, domain: &str) -> String {
        let local = sanitize_local_part(seed);
        format!("{}.{}@{}", local, self.unique_token(), domain)
    }

    pub fn generate_user_data(&self) -> UserRecord {
        let mut rng = rand::thread_rng();
        let first_name = pick(&mut rng, FIRST_NAMES);
        let last_name = pick(&mut rng, LAST_NAMES);
        let country = pick_country(&mut rng).to_string();
        let zipcode = if country == "Canada" {
            canadian_postal_code(&mut rng)
        } else {
            format!("{:05}", rng.gen_range(10000..99999))
        };

        let record = UserRecord {
            name: format!("{first_name} {last_name}"),
            email: self.unique_email(&format!("{first_name}.{last_name}"), &self.user_domain),
            password: (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect(),
            title: Title::random(&mut rng),
            birth_date: BirthDate::random_for_age(&mut rng, 18, 80),
            newsletter: rng.gen_bool(0.5),
            offers: rng.gen_bool(0.5),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            company: pick(&mut rng, COMPANIES).to_string(),
            address: format!("{} {}", rng.gen_range(1..2000), pick(&mut rng, STREETS)),
            country,
            state: pick(&mut rng, STATES).to_string(),
            city: pick(&mut rng, CITIES).to_string(),
            zipcode,
            mobile_number: format!(
                "+1 {:03} {:03} {:04}",
                rng.gen_range(200..999),
                rng.gen_range(100..999),
                rng.gen_range(0..9999)
            ),
        };

        debug!(email = %record.email, "generated user fixture");
        record
    }

    pub fn generate_contact_data(&self) -> ContactRecord {
        let mut rng = rand::thread_rng();
        let first_name = pick(&mut rng, FIRST_NAMES);
        let last_name = pick(&mut rng, LAST_NAMES);

        let subject_len = rng.gen_range(4..=8);
        let mut subject = sentence(&mut rng, subject_len);
        subject.pop(); // no trailing period in the subject line

        let mut paragraphs = Vec::with_capacity(2);
        for _ in 0..2 {
            let mut sentences = Vec::with_capacity(3);
            for _ in 0..3 {
                let len = rng.gen_range(6..12);
                sentences.push(sentence(&mut rng, len));
            }
            paragraphs.push(sentences.join(" "));
        }
        let message = paragraphs.join("\n\n");

        ContactRecord {
            name: format!("{first_name} {last_name}"),
            email: self.unique_email(&format!("{first_name}.{last_name}"), &self.contact_domain),
            subject,
            message,
            attachment: None,
        }
    }

    pub fn generate_transaction(&self) -> TransactionRecord {
        let mut rng = rand::thread_rng();
        let date = Utc::now().date_naive() - chrono::Duration::days(rng.gen_range(0..365));
        TransactionRecord {
            description: pick(&mut rng, TRANSACTION_DESCRIPTIONS).to_string(),
            amount: rng.gen_range(1..5000).to_string(),
            date: date.format("%Y-%m-%d").to_string(),
        }
    }

    /// A random birth date for someone aged 18 to 80.
    pub fn random_birth_date(&self) -> BirthDate {
        BirthDate::random_for_age(&mut rand::thread_rng(), 18, 80)
    }

    /// A six digit number.
    pub fn random_number(&self) -> u32 {
        rand::thread_rng().gen_range(100_000..=999_999)
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn sentence<R: Rng + ?Sized>(rng: &mut R, words: usize) -> String {
    let mut out = (0..words.max(1))
        .map(|_| pick(rng, WORDS))
        .collect::<Vec<_>>()
        .join(" ");
    if let Some(first) = out.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    out.push('.');
    out
}

fn canadian_postal_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut letter = || (b'A' + rng.gen_range(0..26)) as char;
    let (a, b, c) = (letter(), letter(), letter());
    format!(
        "{a}{}{b} {}{c}{}",
        rng.gen_range(0..10),
        rng.gen_range(0..10),
        rng.gen_range(0..10)
    )
}

fn sanitize_local_part(seed: &str) -> String {
    let cleaned: String = seed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '.'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "user".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Static signup/contact profile read from disk
///
/// Email fields are templates; every `{unique}` is replaced by a fresh
/// [`FixtureGenerator::unique_token`] when a record is materialised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileFixture {
    pub user: UserRecord,
    pub contact: ContactRecord,
}

impl ProfileFixture {
    /// Load a profile fixture from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: Self = serde_json::from_str(&content)?;
        fixture.validate()?;
        Ok(fixture)
    }

    fn validate(&self) -> Result<()> {
        for (what, template) in [("user", &self.user.email), ("contact", &self.contact.email)] {
            if !template.contains("{unique}") {
                return Err(Error::InvalidFixture(format!(
                    "{what} email template '{template}' has no {{unique}} placeholder"
                )));
            }
        }
        Ok(())
    }

    pub fn user_record(&self, generator: &FixtureGenerator) -> UserRecord {
        UserRecord {
            email: self.user.email.replace("{unique}", &generator.unique_token()),
            ..self.user.clone()
        }
    }

    /// Relative attachments are resolved against `base_dir`.
    pub fn contact_record(&self, generator: &FixtureGenerator, base_dir: &Path) -> ContactRecord {
        ContactRecord {
            email: self.contact.email.replace("{unique}", &generator.unique_token()),
            attachment: self.contact.attachment.as_ref().map(|p| {
                if p.is_relative() {
                    base_dir.join(p)
                } else {
                    p.clone()
                }
            }),
            ..self.contact.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{FIRST_BIRTH_YEAR, LAST_BIRTH_YEAR};
    use std::collections::HashSet;

    #[test]
    fn test_unique_email_shape() {
        let generator = FixtureGenerator::default();
        let email = generator.unique_email("QA Tester", "automation.test");
        assert!(email.starts_with("qa.tester."));
        assert!(email.ends_with("@automation.test"));
    }

    #[test]
    fn test_generated_user_emails_are_distinct() {
        let generator = FixtureGenerator::default();
        let emails: HashSet<String> = (0..500)
            .map(|_| generator.generate_user_data().email)
            .collect();
        assert_eq!(emails.len(), 500);
    }

    #[test]
    fn test_user_fields_are_populated() {
        let user = FixtureGenerator::default().generate_user_data();
        assert_eq!(user.name, format!("{} {}", user.first_name, user.last_name));
        assert_eq!(user.password.len(), 12);
        assert!(user.birth_date.is_listed());
        assert!(crate::options::COUNTRIES.contains(&user.country.as_str()));
    }

    #[test]
    fn test_random_birth_date_and_number() {
        let generator = FixtureGenerator::default();
        for _ in 0..200 {
            let date = generator.random_birth_date();
            assert!(date.is_listed(), "{date:?}");
            let year: i32 = date.year.parse().unwrap();
            assert!((FIRST_BIRTH_YEAR..=LAST_BIRTH_YEAR).contains(&year), "{year}");

            let n = generator.random_number();
            assert_eq!(n.to_string().len(), 6);
        }
    }

    #[test]
    fn test_contact_subject_has_no_period() {
        let contact = FixtureGenerator::default().generate_contact_data();
        assert!(!contact.subject.ends_with('.'));
        assert!(contact.message.contains("\n\n"));
    }

    #[test]
    fn test_fixture_field_lookup() {
        let user = FixtureGenerator::default().generate_user_data();
        let fixture = Fixture::User(user.clone());
        assert_eq!(fixture.field("email").unwrap(), user.email);
        assert!(matches!(
            fixture.field("subject"),
            Err(Error::UnknownField { .. })
        ));
    }

    #[test]
    fn test_sanitize_local_part() {
        assert_eq!(sanitize_local_part("Ana Maria"), "ana.maria");
        assert_eq!(sanitize_local_part("---"), "user");
    }
}
