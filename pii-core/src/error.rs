//! # Taxonomia de Erros
//!
//! | Variante              | Origem                          | Efeito no pipeline                      |
//! |-----------------------|---------------------------------|-----------------------------------------|
//! | `UnsupportedLanguage` | idioma fora do conjunto fechado | rejeita antes de rodar reconhecedores   |
//! | `ModelUnavailable`    | modelo não carregou / timeout   | degrada o reconhecedor, requisição segue|
//! | `ExtractionFailed`    | extração de texto de arquivo    | pipeline nunca é invocado               |
//! | `InvalidSpan`         | violação de invariante interna  | aborta a requisição (fail closed)       |

use thiserror::Error;

/// Alias de resultado usado em todo o crate.
pub type Result<T> = std::result::Result<T, PiiError>;

#[derive(Debug, Error)]
pub enum PiiError {
    /// Idioma solicitado não está no conjunto configurado.
    #[error("idioma não suportado: {language}")]
    UnsupportedLanguage { language: String },

    /// O modelo estatístico de um idioma falhou ao carregar.
    #[error("modelo indisponível para '{language}': {reason}")]
    ModelUnavailable { language: String, reason: String },

    /// O colaborador de extração de texto falhou.
    #[error("falha na extração de texto ({mime}): {reason}")]
    ExtractionFailed { mime: String, reason: String },

    /// Span fora dos limites ou sobreposto. Sempre um defeito.
    #[error("span inválido [{start}, {end}) para texto de {text_len} bytes: {reason}")]
    InvalidSpan {
        start: usize,
        end: usize,
        text_len: usize,
        reason: &'static str,
    },

    #[error("configuração inválida: {0}")]
    Config(String),

    #[error("artefato de modelo inválido: {0}")]
    ModelFormat(#[from] serde_json::Error),

    #[error("erro ao ler configuração TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("erro de IO: {0}")]
    Io(#[from] std::io::Error),
}

impl PiiError {
    /// `true` para erros que degradam apenas um reconhecedor (não a requisição).
    pub fn is_recognizer_local(&self) -> bool {
        matches!(self, PiiError::ModelUnavailable { .. })
    }
}
