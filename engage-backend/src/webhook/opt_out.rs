//! Opt-out / opt-in keyword detection for incoming text messages

const OPT_OUT_KEYWORDS: &[&str] = &["sair", "parar", "stop", "cancelar", "remover"];
const OPT_IN_KEYWORDS: &[&str] = &["voltar", "retornar", "continuar"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptIntent {
    OptOut,
    OptIn,
}

/// Fold the Latin accents that show up in Portuguese and Spanish text
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Trimmed, lowercased, accent-folded, with trailing punctuation removed
pub fn normalize(text: &str) -> String {
    let folded: String = text.trim().to_lowercase().chars().map(fold_accent).collect();
    folded
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Whole-message match only; "não quero parar agora" is not an opt-out.
pub fn detect_opt_intent(text: &str) -> Option<OptIntent> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }
    if OPT_OUT_KEYWORDS.contains(&normalized.as_str()) {
        Some(OptIntent::OptOut)
    } else if OPT_IN_KEYWORDS.contains(&normalized.as_str()) {
        Some(OptIntent::OptIn)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_out_keywords() {
        assert_eq!(detect_opt_intent("SAIR"), Some(OptIntent::OptOut));
        assert_eq!(detect_opt_intent("  Parar! "), Some(OptIntent::OptOut));
        assert_eq!(detect_opt_intent("stop."), Some(OptIntent::OptOut));
        assert_eq!(detect_opt_intent("remover"), Some(OptIntent::OptOut));
    }

    #[test]
    fn test_opt_in_keywords() {
        assert_eq!(detect_opt_intent("Voltar"), Some(OptIntent::OptIn));
        assert_eq!(detect_opt_intent("continuar!!"), Some(OptIntent::OptIn));
    }

    #[test]
    fn test_accents_are_folded() {
        assert_eq!(normalize("  Éxito, Ação!  "), "exito, acao");
        assert_eq!(normalize("¿Sair?"), "¿sair");
    }

    #[test]
    fn test_keyword_inside_sentence_is_ignored() {
        assert_eq!(detect_opt_intent("não quero parar agora"), None);
        assert_eq!(detect_opt_intent("quero sair do grupo"), None);
        assert_eq!(detect_opt_intent(""), None);
        assert_eq!(detect_opt_intent("???"), None);
    }
}
