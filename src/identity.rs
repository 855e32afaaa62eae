//! Brazilian taxpayer document numbers (CPF and CNPJ).
//!
//! Validation follows the Receita Federal modulo 11 check-digit rules. Every
//! function here is pure: malformed input yields `false`, never an error, and
//! nothing is logged. Callers decide what an invalid document means for them
//! (see [`crate::config::InvalidDocumentPolicy`]).

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of digits in a CPF (individual).
pub const CPF_LENGTH: usize = 11;
/// Number of digits in a CNPJ (organization).
pub const CNPJ_LENGTH: usize = 14;

/// Which registry a digit string belongs to, judged by length alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Cpf,
    Cnpj,
}

impl DocumentKind {
    /// Classifies an already normalized digit string.
    pub fn of(digits: &str) -> Option<Self> {
        match digits.len() {
            CPF_LENGTH => Some(Self::Cpf),
            CNPJ_LENGTH => Some(Self::Cnpj),
            _ => None,
        }
    }
}

/// Strips every character that is not an ASCII decimal digit.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates a CPF or CNPJ, accepting formatted input such as `123.456.789-09`.
pub fn is_valid_document(raw: &str) -> bool {
    let digits = normalize(raw);
    match DocumentKind::of(&digits) {
        Some(DocumentKind::Cpf) => is_valid_cpf(&digits),
        Some(DocumentKind::Cnpj) => is_valid_cnpj(&digits),
        None => false,
    }
}

/// Validates an 11-digit CPF. Formatting characters are not accepted here.
pub fn is_valid_cpf(digits: &str) -> bool {
    let Some(values) = parse_digits(digits, CPF_LENGTH) else {
        return false;
    };
    if all_identical(&values) {
        return false;
    }

    (9..CPF_LENGTH).all(|t| cpf_check_digit(&values[..t]) == values[t])
}

/// Validates a 14-digit CNPJ. Formatting characters are not accepted here.
pub fn is_valid_cnpj(digits: &str) -> bool {
    let Some(values) = parse_digits(digits, CNPJ_LENGTH) else {
        return false;
    };
    if all_identical(&values) {
        return false;
    }

    (12..CNPJ_LENGTH).all(|t| cnpj_check_digit(&values[..t]) == values[t])
}

/// Produces a random CPF that passes [`is_valid_cpf`].
///
/// Nine digits are drawn uniformly from the thread-local RNG and the two
/// check digits are appended. The ten repeated-digit sequences are
/// structurally valid but rejected by the registry, so they are redrawn.
pub fn generate_valid_cpf() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut values: Vec<u8> = (0..9).map(|_| rng.gen_range(0..10u8)).collect();
        let first = cpf_check_digit(&values);
        values.push(first);
        let second = cpf_check_digit(&values);
        values.push(second);

        if !all_identical(&values) {
            return values.iter().map(|d| char::from(b'0' + d)).collect();
        }
    }
}

/// Hides all but the last two digits, for log lines.
pub fn mask(digits: &str) -> String {
    let visible = digits.len().saturating_sub(2);
    digits
        .chars()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { c })
        .collect()
}

fn parse_digits(digits: &str, expected_len: usize) -> Option<Vec<u8>> {
    if digits.len() != expected_len {
        return None;
    }
    digits
        .bytes()
        .map(|b| b.is_ascii_digit().then(|| b - b'0'))
        .collect()
}

fn all_identical(values: &[u8]) -> bool {
    values.windows(2).all(|pair| pair[0] == pair[1])
}

/// Check digit over `prefix` with weights `len+1 .. 2`.
fn cpf_check_digit(prefix: &[u8]) -> u8 {
    let t = prefix.len() as u32;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(c, &d)| u32::from(d) * (t + 1 - c as u32))
        .sum();
    ((10 * sum) % 11 % 10) as u8
}

/// Check digit over `prefix` with the cycling 2..9 weights, right to left.
fn cnpj_check_digit(prefix: &[u8]) -> u8 {
    let length = prefix.len() as i32;
    let mut pos = length - 7;
    let mut sum: i32 = 0;
    for i in (1..=length).rev() {
        if pos < 2 {
            pos = 9;
        }
        sum += i32::from(prefix[(length - i) as usize]) * pos;
        pos -= 1;
    }
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        (11 - remainder) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_cpf_vectors() {
        assert!(is_valid_cpf("11144477735"));
        assert!(!is_valid_cpf("11144477736"));
        assert!(is_valid_cpf("12345678909"));
    }

    #[test]
    fn known_cnpj_vectors() {
        assert!(is_valid_cnpj("11222333000181"));
        assert!(!is_valid_cnpj("11222333000180"));
        assert!(is_valid_cnpj("11444777000161"));
    }

    #[test]
    fn repeated_digits_are_rejected() {
        for d in 0..=9u8 {
            let c = char::from(b'0' + d);
            assert!(!is_valid_cpf(&c.to_string().repeat(CPF_LENGTH)));
            assert!(!is_valid_cnpj(&c.to_string().repeat(CNPJ_LENGTH)));
        }
        assert!(!is_valid_document("000.000.000-00"));
    }

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(normalize("123.456.789-09"), "12345678909");
        assert_eq!(normalize("11.222.333/0001-81"), "11222333000181");
        assert_eq!(normalize("abc"), "");
    }

    #[test]
    fn document_dispatches_on_length() {
        assert!(is_valid_document("111.444.777-35"));
        assert!(is_valid_document("11.222.333/0001-81"));
        assert!(!is_valid_document("1114447773"));
        assert!(!is_valid_document("111444777350"));
        assert!(!is_valid_document(""));
    }

    #[test]
    fn direct_checks_reject_formatted_or_short_input() {
        assert!(!is_valid_cpf("111.444.777-35"));
        assert!(!is_valid_cpf("1114447773"));
        assert!(!is_valid_cnpj("11.222.333/0001-81"));
    }

    #[test]
    fn generated_cpf_is_valid() {
        for _ in 0..1_000 {
            let cpf = generate_valid_cpf();
            assert_eq!(cpf.len(), CPF_LENGTH);
            assert!(is_valid_cpf(&cpf), "generated invalid cpf {cpf}");
        }
    }

    #[test]
    fn kind_is_judged_by_length() {
        assert_eq!(DocumentKind::of("11144477735"), Some(DocumentKind::Cpf));
        assert_eq!(DocumentKind::of("11222333000181"), Some(DocumentKind::Cnpj));
        assert_eq!(DocumentKind::of("123"), None);
    }

    #[test]
    fn mask_keeps_last_two_digits() {
        assert_eq!(mask("11144477735"), "*********35");
        assert_eq!(mask("7"), "7");
    }
}
