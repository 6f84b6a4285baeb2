use crate::api::{ApiError, CatalogApi};
use catalog_types::enquiry::{Enquiry, EnquiryReceipt};
use derive_more::{Display, Error};
use itertools::Itertools;
use lazy_regex::regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EnquiryField {
    #[display("name")]
    Name,
    #[display("email")]
    Email,
    #[display("phone")]
    Phone,
    #[display("interest")]
    Interest,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display("{field}: {message}")]
pub struct FieldError {
    pub field: EnquiryField,
    pub message: String,
}

impl FieldError {
    fn new(field: EnquiryField, message: &str) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Display, Error)]
pub enum EnquiryError {
    #[error(ignore)]
    #[display("{}", _0.iter().join("; "))]
    Invalid(Vec<FieldError>),
    #[display("Unable to send enquiry: {_0}")]
    Api(ApiError),
}

impl EnquiryError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Invalid(_) => false,
            Self::Api(err) => err.is_retryable(),
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Invalid(errors) => errors,
            Self::Api(_) => &[],
        }
    }
}

impl From<ApiError> for EnquiryError {
    fn from(err: ApiError) -> Self {
        EnquiryError::Api(err)
    }
}

/// Checks every field and returns all problems at once.
pub fn validate_enquiry(enquiry: &Enquiry) -> Vec<FieldError> {
    let mut errors = vec![];
    if enquiry.name.trim().chars().count() < 2 {
        errors.push(FieldError::new(
            EnquiryField::Name,
            "Please enter your name",
        ));
    }
    let email = enquiry.email.trim();
    if email.is_empty() {
        errors.push(FieldError::new(EnquiryField::Email, "Email is required"));
    } else if !regex!(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_match(email) {
        errors.push(FieldError::new(
            EnquiryField::Email,
            "Please enter a valid email address",
        ));
    }
    let phone = enquiry.phone.trim();
    if phone.is_empty() {
        errors.push(FieldError::new(EnquiryField::Phone, "Phone is required"));
    } else if !regex!(r"^\+?[\d\s()-]{7,}$").is_match(phone)
        || phone.chars().filter(char::is_ascii_digit).count() < 7
    {
        errors.push(FieldError::new(
            EnquiryField::Phone,
            "Please enter a valid phone number",
        ));
    }
    if enquiry.interest.trim().is_empty() {
        errors.push(FieldError::new(
            EnquiryField::Interest,
            "Please tell us what you are interested in",
        ));
    }
    errors
}

fn normalized(enquiry: &Enquiry) -> Enquiry {
    Enquiry {
        name: enquiry.name.trim().to_string(),
        email: enquiry.email.trim().to_string(),
        phone: enquiry.phone.trim().to_string(),
        interest: enquiry.interest.trim().to_string(),
        page_url: enquiry.page_url.clone(),
        source_page: enquiry
            .source_page
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

/// Validates, then posts. Nothing is sent when a field is invalid.
pub async fn submit_enquiry(
    api: &dyn CatalogApi,
    enquiry: &Enquiry,
) -> Result<EnquiryReceipt, EnquiryError> {
    let errors = validate_enquiry(enquiry);
    if !errors.is_empty() {
        return Err(EnquiryError::Invalid(errors));
    }
    let receipt = api.submit_enquiry(&normalized(enquiry)).await?;
    log::info!(
        "Enquiry submitted{}",
        receipt
            .id
            .map(|id| format!(" as #{id}"))
            .unwrap_or_default()
    );
    Ok(receipt)
}
