//! 短码生成与别名校验
//!
//! 生成码取自固定字母表，由 `rand` 的线程 RNG（ChaCha，OS 播种）逐位抽取，不使用计数器。
//! 唯一性由存储的唯一约束保证，生成器本身不查重。

use std::collections::HashSet;

use crate::config::CodeConfig;
use crate::errors::{LinkpulseError, Result};
use crate::storage::MAX_SHORT_CODE_LEN;

/// 码空间下限：`alphabet_len ^ length >= 2^30`
const MIN_CODE_SPACE_BITS: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: Vec<char>,
    members: HashSet<char>,
    length: usize,
    max_attempts: u32,
    min_alias_length: usize,
    max_alias_length: usize,
    reserved: HashSet<String>,
}

impl CodeGenerator {
    /// 校验配置并构建生成器，配置不合法时返回 `Config` 错误
    pub fn new(config: &CodeConfig) -> Result<Self> {
        let alphabet: Vec<char> = config.alphabet.chars().collect();
        let members: HashSet<char> = alphabet.iter().copied().collect();

        if members.len() != alphabet.len() {
            return Err(LinkpulseError::config(
                "Code alphabet contains duplicate characters",
            ));
        }
        if members.len() < 2 {
            return Err(LinkpulseError::config(
                "Code alphabet needs at least 2 distinct characters",
            ));
        }
        if alphabet.iter().any(|c| c.is_whitespace() || *c == '/') {
            return Err(LinkpulseError::config(
                "Code alphabet must not contain whitespace or '/'",
            ));
        }

        let bits = config.length as f64 * (alphabet.len() as f64).log2();
        if bits < MIN_CODE_SPACE_BITS {
            return Err(LinkpulseError::config(format!(
                "Code space too small: {} characters of length {} gives {:.1} bits, need at least {}",
                alphabet.len(),
                config.length,
                bits,
                MIN_CODE_SPACE_BITS
            )));
        }

        if config.min_alias_length == 0 || config.min_alias_length > config.max_alias_length {
            return Err(LinkpulseError::config(format!(
                "Invalid alias length window [{}, {}]",
                config.min_alias_length, config.max_alias_length
            )));
        }

        if config.length > MAX_SHORT_CODE_LEN || config.max_alias_length > MAX_SHORT_CODE_LEN {
            return Err(LinkpulseError::config(format!(
                "Codes and aliases are limited to {} characters",
                MAX_SHORT_CODE_LEN
            )));
        }

        Ok(Self {
            alphabet,
            members,
            length: config.length,
            max_attempts: config.max_attempts.max(1),
            min_alias_length: config.min_alias_length,
            max_alias_length: config.max_alias_length,
            reserved: config
                .reserved_words
                .iter()
                .map(|w| w.to_lowercase())
                .collect(),
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// 生成一个候选短码（不保证唯一，跳过保留字）
    pub fn generate(&self) -> String {
        loop {
            let code: String = std::iter::repeat_with(|| {
                self.alphabet[rand::random_range(0..self.alphabet.len())]
            })
            .take(self.length)
            .collect();
            if !self.is_reserved(&code) {
                return code;
            }
        }
    }

    pub fn is_reserved(&self, code: &str) -> bool {
        self.reserved.contains(&code.to_lowercase())
    }

    /// 校验自定义别名：字母表、长度窗口、保留字
    pub fn validate_alias(&self, alias: &str) -> Result<()> {
        let len = alias.chars().count();
        if len < self.min_alias_length || len > self.max_alias_length {
            return Err(LinkpulseError::invalid_alias(format!(
                "Alias '{}' must be {}-{} characters long",
                alias, self.min_alias_length, self.max_alias_length
            )));
        }
        if let Some(bad) = alias.chars().find(|c| !self.members.contains(c)) {
            return Err(LinkpulseError::invalid_alias(format!(
                "Alias '{}' contains disallowed character '{}'",
                alias, bad
            )));
        }
        if self.is_reserved(alias) {
            return Err(LinkpulseError::reserved_alias(format!(
                "Alias '{}' is reserved",
                alias
            )));
        }
        Ok(())
    }

    /// 重定向入口的快速校验：字符属于字母表，长度为生成码长度或在别名窗口内
    pub fn is_valid_code(&self, code: &str) -> bool {
        let len = code.chars().count();
        let length_ok = len == self.length
            || (self.min_alias_length..=self.max_alias_length).contains(&len);
        length_ok && code.chars().all(|c| self.members.contains(&c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CodeConfig {
        CodeConfig::default()
    }

    #[test]
    fn test_generate_uses_alphabet_and_length() {
        let generator = CodeGenerator::new(&config()).unwrap();
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(generator.is_valid_code(&code));
        }
    }

    #[test]
    fn test_generated_codes_are_not_sequential() {
        let generator = CodeGenerator::new(&config()).unwrap();
        let codes: HashSet<String> = (0..1000).map(|_| generator.generate()).collect();
        assert!(codes.len() > 990);
    }

    #[test]
    fn test_small_code_space_is_rejected() {
        let mut cfg = config();
        cfg.length = 4;
        let err = CodeGenerator::new(&cfg).unwrap_err();
        assert!(matches!(err, LinkpulseError::Config(_)));
        assert!(err.is_fatal());

        cfg.length = 40;
        cfg.alphabet = "ab".into();
        assert!(CodeGenerator::new(&cfg).is_ok());
    }

    #[test]
    fn test_bad_alphabets_are_rejected() {
        for alphabet in ["a", "aab", "ab c", "ab/c"] {
            let mut cfg = config();
            cfg.alphabet = alphabet.into();
            cfg.length = 64;
            assert!(CodeGenerator::new(&cfg).is_err(), "alphabet {:?}", alphabet);
        }
    }

    #[test]
    fn test_codes_must_fit_the_column() {
        let mut cfg = config();
        cfg.max_alias_length = MAX_SHORT_CODE_LEN + 1;
        assert!(matches!(
            CodeGenerator::new(&cfg),
            Err(LinkpulseError::Config(_))
        ));

        let mut cfg = config();
        cfg.alphabet = "ab".into();
        cfg.length = MAX_SHORT_CODE_LEN + 1;
        assert!(CodeGenerator::new(&cfg).is_err());
    }

    #[test]
    fn test_validate_alias() {
        let generator = CodeGenerator::new(&config()).unwrap();
        assert!(generator.validate_alias("promo2026").is_ok());
        assert!(matches!(
            generator.validate_alias("ab"),
            Err(LinkpulseError::InvalidAlias(_))
        ));
        assert!(matches!(
            generator.validate_alias("has-dash"),
            Err(LinkpulseError::InvalidAlias(_))
        ));
        assert!(matches!(
            generator.validate_alias("Admin"),
            Err(LinkpulseError::ReservedAlias(_))
        ));
        assert!(matches!(
            generator.validate_alias(&"x".repeat(33)),
            Err(LinkpulseError::InvalidAlias(_))
        ));
    }

    #[test]
    fn test_is_valid_code() {
        let generator = CodeGenerator::new(&config()).unwrap();
        assert!(generator.is_valid_code("abc"));
        assert!(!generator.is_valid_code("ab"));
        assert!(!generator.is_valid_code("abc/def"));
        assert!(!generator.is_valid_code(""));
    }
}
