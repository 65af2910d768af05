//! # Modelos Estatísticos por Idioma
//!
//! Um [`NerModel`] agrega os pesos do CRF e os gazetteers de um idioma.
//! Ele é carregado uma única vez por idioma pelo
//! [`registry`](crate::registry) e compartilhado (somente leitura) entre
//! todas as requisições.
//!
//! ## Fontes de modelo
//!
//! - `builtin`: pesos heurísticos embutidos para `es` e `en`, derivados de
//!   intuições linguísticas (capitalização, títulos, preposições de lugar)
//!   em vez de treinamento.
//! - caminho de arquivo: artefato JSON com o mesmo formato de [`NerModel`].
//!
//! ## Tabela de rótulos
//!
//! | Nativo | EntityKind     |
//! |--------|----------------|
//! | PER    | PERSON         |
//! | LOC    | LOCATION       |
//! | ORG    | ORGANIZATION   |
//! | MISC   | (descartado)   |

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::crf::CrfModel;
use crate::error::{PiiError, Result};
use crate::features::Gazetteers;
use crate::span::{EntityKind, LanguageTag};
use crate::tagger::{NativeLabel, Tag};

/// Modelo NER de um idioma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerModel {
    pub language: LanguageTag,
    pub crf: CrfModel,
    #[serde(default)]
    pub gazetteers: Gazetteers,
}

impl NerModel {
    /// Lê um artefato JSON e valida a forma dos pesos.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model: NerModel = serde_json::from_str(&raw)?;
        model.crf.check_shape().map_err(|reason| PiiError::ModelUnavailable {
            language: model.language.to_string(),
            reason,
        })?;
        Ok(model)
    }

    /// Modelo embutido para `language`, se existir.
    pub fn builtin(language: &LanguageTag) -> Option<Self> {
        let lexicon = match language.as_str() {
            "es" => &SPANISH,
            "en" => &ENGLISH,
            _ => return None,
        };
        Some(Self {
            language: language.clone(),
            crf: build_crf(lexicon),
            gazetteers: build_gazetteers(lexicon),
        })
    }
}

/// Tabela fixa rótulo nativo → categoria. `None` = rótulo descartado.
pub fn map_label(label: NativeLabel) -> Option<EntityKind> {
    match label {
        NativeLabel::Per => Some(EntityKind::PERSON),
        NativeLabel::Loc => Some(EntityKind::LOCATION),
        NativeLabel::Org => Some(EntityKind::ORGANIZATION),
        NativeLabel::Misc => None,
    }
}

/// De onde vem o modelo de um idioma: `"builtin"` ou um caminho.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSource {
    Builtin,
    File(PathBuf),
}

impl From<String> for ModelSource {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("builtin") {
            ModelSource::Builtin
        } else {
            ModelSource::File(PathBuf::from(s))
        }
    }
}

impl From<ModelSource> for String {
    fn from(source: ModelSource) -> Self {
        source.to_string()
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Builtin => f.write_str("builtin"),
            ModelSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Carregador de modelos. O registry chama `load` no máximo uma vez por
/// idioma com sucesso; falhas podem ser repetidas em requisições futuras.
pub trait ModelLoader: Send + Sync {
    fn load(&self, language: &LanguageTag, source: &ModelSource) -> Result<NerModel>;
}

/// Carregador padrão: modelos embutidos ou artefatos JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultModelLoader;

impl ModelLoader for DefaultModelLoader {
    fn load(&self, language: &LanguageTag, source: &ModelSource) -> Result<NerModel> {
        let unavailable = |reason: String| PiiError::ModelUnavailable {
            language: language.to_string(),
            reason,
        };

        match source {
            ModelSource::Builtin => NerModel::builtin(language)
                .ok_or_else(|| unavailable("sem modelo embutido para o idioma".to_string())),
            ModelSource::File(path) => {
                debug!(%language, path = %path.display(), "lendo artefato de modelo");
                let model = NerModel::from_json_file(path)
                    .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
                if &model.language != language {
                    warn!(
                        expected = %language,
                        found = %model.language,
                        "artefato declara outro idioma; usando mesmo assim"
                    );
                }
                Ok(model)
            }
        }
    }
}

/// Vocabulário específico de um idioma usado para montar o modelo embutido.
struct Lexicon {
    person_titles: &'static [&'static str],
    location_triggers: &'static [&'static str],
    location_prepositions: &'static [&'static str],
    org_triggers: &'static [&'static str],
    org_suffixes: &'static [&'static str],
    function_words: &'static [&'static str],
    persons: &'static [&'static str],
    locations: &'static [&'static str],
    organizations: &'static [&'static str],
}

static SPANISH: Lexicon = Lexicon {
    person_titles: &[
        "señor", "señora", "señorita", "sr", "sra", "srta", "don", "doña", "doctor", "doctora",
        "dr", "dra", "ingeniero", "ingeniera", "ing", "licenciado", "licenciada", "lic",
        "profesor", "profesora", "prof", "presidente", "presidenta", "ministro", "ministra",
        "alcalde", "alcaldesa", "gobernador", "gobernadora", "senador", "senadora", "paciente",
        "cliente", "llamo", "soy",
    ],
    location_triggers: &[
        "ciudad", "municipio", "departamento", "barrio", "país", "región", "vereda", "provincia",
    ],
    location_prepositions: &["en", "de", "desde", "hacia", "hasta"],
    org_triggers: &[
        "empresa", "banco", "universidad", "fundación", "corporación", "ministerio", "hospital",
        "clínica", "colegio", "compañía",
    ],
    org_suffixes: &["sas", "ltda", "sa", "s.a", "s.a.s", "eps", "ips"],
    function_words: &[
        "el", "la", "los", "las", "un", "una", "mi", "mis", "su", "sus", "de", "del", "en", "y",
        "o", "que", "por", "para", "con", "es", "hola", "buenos", "buenas", "gracias", "este",
        "esta", "señor", "señora",
    ],
    persons: &[
        "Juan", "María", "José", "Luis", "Carlos", "Andrés", "Camila", "Valentina", "Santiago",
        "Sofía", "Daniel", "Alejandro", "Laura", "Ana", "Diego", "Gabriela", "Jorge", "Paula",
        "Felipe", "Natalia", "Sebastián", "Mariana", "Julián", "Catalina", "Pedro", "Lucía",
        "Pérez", "Gómez", "Rodríguez", "González", "Martínez", "López", "García", "Hernández",
        "Ramírez", "Torres", "Díaz", "Vargas", "Castro", "Rojas", "Moreno", "Jiménez", "Ruiz",
        "Suárez", "Ortiz", "Restrepo", "Cárdenas", "Ospina", "Zapata", "Muñoz", "Salazar",
    ],
    locations: &[
        "Bogotá", "Medellín", "Cali", "Barranquilla", "Cartagena", "Bucaramanga", "Pereira",
        "Manizales", "Cúcuta", "Santa Marta", "Ibagué", "Pasto", "Villavicencio", "Neiva",
        "Armenia", "Popayán", "Tunja", "Montería", "Sincelejo", "Valledupar", "Colombia",
        "Antioquia", "Cundinamarca", "Valle del Cauca", "Atlántico", "Santander", "Boyacá",
        "Nariño", "Huila", "Tolima", "Caldas", "Risaralda", "Quindío", "Cauca", "Chocó",
        "Madrid", "Barcelona", "México", "Lima", "Quito", "Caracas", "Panamá", "España",
        "Venezuela", "Ecuador", "Perú", "Argentina", "Chile",
    ],
    organizations: &[
        "Bancolombia", "Davivienda", "Ecopetrol", "Avianca", "DIAN", "Registraduría", "SENA",
        "Icetex", "Colsanitas", "Sura", "Colpensiones", "Movistar", "Claro", "Tigo", "Éxito",
        "Fiscalía", "Procuraduría", "Contraloría",
    ],
};

static ENGLISH: Lexicon = Lexicon {
    person_titles: &[
        "mr", "mrs", "ms", "miss", "dr", "doctor", "prof", "professor", "sir", "madam",
        "president", "senator", "governor", "mayor", "officer", "patient", "customer", "am",
        "named",
    ],
    location_triggers: &["city", "town", "county", "state", "country", "province", "village"],
    location_prepositions: &["in", "from", "to", "near", "at"],
    org_triggers: &[
        "company", "bank", "university", "foundation", "corporation", "ministry", "hospital",
        "clinic", "school", "agency",
    ],
    org_suffixes: &["inc", "corp", "ltd", "llc", "co", "plc"],
    function_words: &[
        "the", "a", "an", "my", "his", "her", "their", "our", "of", "in", "and", "or", "that",
        "for", "with", "is", "hello", "hi", "dear", "thanks", "this", "i",
    ],
    persons: &[
        "John", "Mary", "James", "Robert", "Michael", "William", "David", "Richard", "Joseph",
        "Thomas", "Jennifer", "Linda", "Elizabeth", "Susan", "Jessica", "Sarah", "Karen",
        "Emily", "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Wilson",
        "Taylor", "Anderson", "Thomas", "Jackson", "White", "Harris", "Martin", "Thompson",
    ],
    locations: &[
        "London", "New York", "Boston", "Chicago", "Texas", "California", "Florida", "Seattle",
        "Toronto", "England", "Canada", "Australia", "Washington", "Los Angeles", "Miami",
        "Houston", "Dallas", "Denver", "Atlanta", "Ireland", "Scotland", "Colombia", "Mexico",
    ],
    organizations: &[
        "Google", "Microsoft", "Amazon", "Apple", "IBM", "Oracle", "FBI", "NASA", "Netflix",
        "Tesla", "Walmart", "Pfizer", "Boeing",
    ],
};

fn build_gazetteers(lexicon: &Lexicon) -> Gazetteers {
    let mut gaz = Gazetteers::new();
    Gazetteers::extend_words(&mut gaz.persons, lexicon.persons.iter().copied());
    Gazetteers::extend_words(&mut gaz.locations, lexicon.locations.iter().copied());
    Gazetteers::extend_words(&mut gaz.organizations, lexicon.organizations.iter().copied());
    // "del" de "Valle del Cauca" não é um lugar sozinho
    for word in lexicon.function_words {
        gaz.locations.remove(*word);
        gaz.persons.remove(*word);
    }
    gaz
}

/// Pesos heurísticos do CRF para um idioma.
///
/// O viés para `O` (2.0) é maior que o peso de capitalização sozinho, de modo
/// que uma palavra só vira entidade com evidência adicional: gazetteer,
/// título antes, preposição de lugar ou continuação de uma entidade.
fn build_crf(lexicon: &Lexicon) -> CrfModel {
    let mut model = CrfModel::new();
    let per_b = Tag::Begin(NativeLabel::Per);
    let per_i = Tag::Inside(NativeLabel::Per);
    let loc_b = Tag::Begin(NativeLabel::Loc);
    let loc_i = Tag::Inside(NativeLabel::Loc);
    let org_b = Tag::Begin(NativeLabel::Org);
    let org_i = Tag::Inside(NativeLabel::Org);

    // --- Ortografia ---
    model.set_emission("bias", &Tag::Outside, 2.0);
    model.set_emission("BOS", &Tag::Outside, 0.5);
    model.set_emission("is_capitalized", &per_b, 1.5);
    model.set_emission("is_capitalized", &loc_b, 1.0);
    model.set_emission("is_capitalized", &org_b, 1.0);
    model.set_emission("is_capitalized", &per_i, 1.0);
    model.set_emission("is_capitalized", &loc_i, 0.8);
    model.set_emission("is_capitalized", &org_i, 0.8);
    model.set_emission("prev_is_capitalized", &per_i, 1.0);
    model.set_emission("prev_is_capitalized", &loc_i, 0.5);
    model.set_emission("prev_is_capitalized", &org_i, 0.5);
    model.set_emission("is_all_caps", &org_b, 1.5);

    // Números, pontuação e e-mails nunca são nomes
    model.set_emission("is_punctuation", &Tag::Outside, 5.0);
    model.set_emission("is_digit", &Tag::Outside, 3.0);
    model.set_emission("has_digit", &Tag::Outside, 2.0);
    model.set_emission("has_at", &Tag::Outside, 4.0);

    // --- Gazetteers ---
    model.set_emission("in_person_gazetteer", &per_b, 4.0);
    model.set_emission("in_person_gazetteer", &per_i, 4.0);
    model.set_emission("in_location_gazetteer", &loc_b, 4.0);
    model.set_emission("in_location_gazetteer", &loc_i, 3.5);
    model.set_emission("in_org_gazetteer", &org_b, 4.0);
    model.set_emission("in_org_gazetteer", &org_i, 3.5);

    // --- Contexto ---
    for title in lexicon.person_titles {
        model.set_emission(&format!("prev_word={title}"), &per_b, 2.5);
        // o próprio título ("Dr.", "Sra.") não faz parte do nome
        model.set_emission(&format!("word={title}"), &Tag::Outside, 2.0);
        model.set_emission(&format!("word={title}."), &Tag::Outside, 2.0);
    }
    for trigger in lexicon.location_triggers {
        model.set_emission(&format!("prev_word={trigger}"), &loc_b, 2.0);
    }
    for prep in lexicon.location_prepositions {
        model.set_emission(&format!("prev_word={prep}"), &loc_b, 0.8);
    }
    for trigger in lexicon.org_triggers {
        model.set_emission(&format!("prev_word={trigger}"), &org_b, 2.0);
    }
    for suffix in lexicon.org_suffixes {
        model.set_emission(&format!("next_word={suffix}"), &org_b, 2.0);
        model.set_emission(&format!("word={suffix}"), &org_i, 2.5);
    }
    for word in lexicon.function_words {
        model.set_emission(&format!("word={word}"), &Tag::Outside, 3.0);
    }

    // --- Transições ---
    let tags = Tag::all();
    for prev in &tags {
        for next in &tags {
            if !Tag::is_valid_transition(prev, next) {
                model.set_transition(prev, next, -8.0);
            }
        }
    }
    for label in [NativeLabel::Per, NativeLabel::Org, NativeLabel::Loc, NativeLabel::Misc] {
        let b = Tag::Begin(label);
        let i = Tag::Inside(label);
        model.set_transition(&b, &i, 4.0);
        model.set_transition(&i, &i, 3.5);
        model.set_transition(&b, &Tag::Outside, 2.0);
        model.set_transition(&i, &Tag::Outside, 2.5);
        model.set_transition(&Tag::Outside, &b, 1.5);
    }
    model.set_transition(&Tag::Outside, &Tag::Outside, 2.5);

    model
}
