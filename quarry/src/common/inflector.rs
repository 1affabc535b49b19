use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// words with the same singular and plural form
const UNCOUNTABLE: &[&str] = &[
    ".*[nrlm]ese", ".*deer", ".*fish", ".*measles", ".*ois", ".*pox", ".*sheep", "bison", "bream",
    "breeches", "britches", "buffalo", "cantus", "carp", "chassis", "clippers", "cod", "coitus",
    "contretemps", "corps", "debris", "diabetes", "djinn", "eland", "elk", "equipment", "flounder",
    "gallows", "graffiti", "headquarters", "herpes", "hijinks", "information", "innings",
    "jackanapes", "mackerel", "media", "mews", "moose", "mumps", "news", "nexus", "pincers",
    "pliers", "proceedings", "rabies", "rice", "rhinoceros", "salmon", "scissors", "sea[- ]bass",
    "series", "shears", "siemens", "species", "swine", "testes", "trousers", "trout", "tuna",
    "whiting", "wildebeest",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("atlas", "atlases"),
    ("beef", "beefs"),
    ("brother", "brothers"),
    ("child", "children"),
    ("corpus", "corpuses"),
    ("cow", "cows"),
    ("ganglion", "ganglions"),
    ("genie", "genies"),
    ("genus", "genera"),
    ("graffito", "graffiti"),
    ("hoof", "hoofs"),
    ("loaf", "loaves"),
    ("man", "men"),
    ("money", "monies"),
    ("mongoose", "mongooses"),
    ("move", "moves"),
    ("mythos", "mythoi"),
    ("numen", "numina"),
    ("occiput", "occiputs"),
    ("octopus", "octopuses"),
    ("opus", "opuses"),
    ("ox", "oxen"),
    ("person", "people"),
    ("sex", "sexes"),
    ("soliloquy", "soliloquies"),
    ("testis", "testes"),
    ("trilby", "trilbys"),
    ("turf", "turfs"),
];

// first matching rule wins
const PLURAL_RULES: &[(&str, &str)] = &[
    ("(?i)(s)tatus$", "${1}tatuses"),
    ("(?i)(quiz)$", "${1}zes"),
    ("(?i)^(ox)$", "${1}en"),
    ("(?i)([m|l])ouse$", "${1}ice"),
    ("(?i)(matr|vert|ind)(ix|ex)$", "${1}ices"),
    ("(?i)(x|ch|ss|sh)$", "${1}es"),
    ("(?i)([^aeiouy]|qu)y$", "${1}ies"),
    ("(?i)(hive)$", "${1}s"),
    ("(?i)(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    ("(?i)sis$", "ses"),
    ("(?i)([ti])um$", "${1}a"),
    ("(?i)(p)erson$", "${1}eople"),
    ("(?i)(m)an$", "${1}en"),
    ("(?i)(c)hild$", "${1}hildren"),
    ("(?i)(buffal|tomat)o$", "${1}oes"),
    (
        "(?i)(alumn|bacill|cact|foc|fung|nucle|radi|stimul|syllab|termin|vir)us$",
        "${1}i",
    ),
    ("us$", "uses"),
    ("(?i)(alias)$", "${1}es"),
    ("(?i)(ax|cri|test)is$", "${1}es"),
    ("s$", "s"),
    ("^$", ""),
    ("$", "s"),
];

const SINGULAR_RULES: &[(&str, &str)] = &[
    ("(?i)(s)tatuses$", "${1}tatus"),
    ("(?i)^(.*)(menu)s$", "${1}${2}"),
    ("(?i)(quiz)zes$", "${1}"),
    ("(?i)(matr)ices$", "${1}ix"),
    ("(?i)(vert|ind)ices$", "${1}ex"),
    ("(?i)^(ox)en", "${1}"),
    ("(?i)(alias)(es)*$", "${1}"),
    (
        "(?i)(alumn|bacill|cact|foc|fung|nucle|radi|stimul|syllab|termin|viri?)i$",
        "${1}us",
    ),
    ("(?i)(cris|ax|test)es$", "${1}is"),
    ("(?i)(shoe)s$", "${1}"),
    ("(?i)(o)es$", "${1}"),
    ("ouses$", "ouse"),
    ("uses$", "us"),
    ("(?i)([m|l])ice$", "${1}ouse"),
    ("(?i)(x|ch|ss|sh)es$", "${1}"),
    ("(?i)(m)ovies$", "${1}ovie"),
    ("(?i)(s)eries$", "${1}eries"),
    ("(?i)([^aeiouy]|qu)ies$", "${1}y"),
    ("(?i)([lr])ves$", "${1}f"),
    ("(?i)(tive)s$", "${1}"),
    ("(?i)(hive)s$", "${1}"),
    ("(?i)(drive)s$", "${1}"),
    ("(?i)([^fo])ves$", "${1}fe"),
    ("(?i)(^analy)ses$", "${1}sis"),
    (
        "(?i)((a)naly|(b)a|(d)iagno|(p)arenthe|(p)rogno|(s)ynop|(t)he)ses$",
        "${1}sis",
    ),
    ("(?i)([ti])a$", "${1}um"),
    ("(?i)(p)eople$", "${1}erson"),
    ("(?i)(m)en$", "${1}an"),
    ("(?i)(c)hildren$", "${1}hild"),
    ("(?i)(n)ews$", "${1}ews"),
    ("^(.*us)$", "${1}"),
    ("(?i)s$", ""),
];

struct Rules {
    uncountable: Option<Regex>,
    plural_irregular: Option<Regex>,
    singular_irregular: Option<Regex>,
    to_plural: HashMap<&'static str, &'static str>,
    to_singular: HashMap<&'static str, &'static str>,
    plural: Vec<(Regex, &'static str)>,
    singular: Vec<(Regex, &'static str)>,
}

fn compile(rules: &[(&'static str, &'static str)]) -> Vec<(Regex, &'static str)> {
    rules
        .iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(regex) => Some((regex, *replacement)),
            Err(err) => {
                log::error!("Invalid inflection rule {:?}: {}", pattern, err);
                None
            }
        })
        .collect()
}

fn compile_table(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            log::error!("Invalid inflection table {:?}: {}", pattern, err);
            None
        }
    }
}

fn irregular_pattern<'a>(words: impl Iterator<Item = &'a str>) -> Option<Regex> {
    let alternatives = words.collect::<Vec<_>>().join("|");
    compile_table(&format!(r"(?i)^(.*?)\b({})$", alternatives))
}

static RULES: Lazy<Rules> = Lazy::new(|| Rules {
    uncountable: compile_table(&format!("(?i)^(?:{})$", UNCOUNTABLE.join("|"))),
    plural_irregular: irregular_pattern(IRREGULAR.iter().map(|(s, _)| *s)),
    singular_irregular: irregular_pattern(IRREGULAR.iter().map(|(_, p)| *p)),
    to_plural: IRREGULAR.iter().copied().collect(),
    to_singular: IRREGULAR.iter().map(|(s, p)| (*p, *s)).collect(),
    plural: compile(PLURAL_RULES),
    singular: compile(SINGULAR_RULES),
});

impl Rules {
    fn is_uncountable(&self, word: &str) -> bool {
        self.uncountable.as_ref().is_some_and(|regex| regex.is_match(word))
    }
}

// keeps the case of the first letter of the matched word
fn replace_irregular(
    word: &str,
    regex: &Option<Regex>,
    table: &HashMap<&str, &str>,
) -> Option<String> {
    let captures = regex.as_ref()?.captures(word)?;
    let prefix = captures.get(1).map_or("", |m| m.as_str());
    let matched = captures.get(2)?.as_str();
    let replacement = table.get(matched.to_lowercase().as_str())?;
    let first = matched.chars().next()?;
    Some(format!("{}{}{}", prefix, first, &replacement[1..]))
}

fn apply_rules(word: &str, rules: &[(Regex, &str)]) -> String {
    for (regex, replacement) in rules {
        if regex.is_match(word) {
            return regex.replace(word, *replacement).into_owned();
        }
    }
    word.to_string()
}

/// Changes the form of a word from singular to plural.
///
/// ```rust
/// use quarry::common::pluralize;
///
/// assert_eq!(pluralize("post"), "posts");
/// assert_eq!(pluralize("person"), "people");
/// assert_eq!(pluralize("category"), "categories");
/// ```
pub fn pluralize(word: &str) -> String {
    let rules = &*RULES;
    if rules.is_uncountable(word) {
        return word.to_string();
    }
    if let Some(plural) = replace_irregular(word, &rules.plural_irregular, &rules.to_plural) {
        return plural;
    }
    apply_rules(word, &rules.plural)
}

/// Changes the form of a word from plural to singular.
pub fn singularize(word: &str) -> String {
    let rules = &*RULES;
    if let Some(singular) = replace_irregular(word, &rules.singular_irregular, &rules.to_singular) {
        return singular;
    }
    if rules.is_uncountable(word) {
        return word.to_string();
    }
    apply_rules(word, &rules.singular)
}

/// Turns a CamelCased word into its under_scored form.
///
/// Spaces and dashes become underscores and characters other than ASCII
/// letters, digits and underscores are dropped.
pub fn underscore(word: &str) -> String {
    let mut result = String::with_capacity(word.len() + 4);
    let mut previous: Option<char> = None;
    for c in word.chars() {
        if c.is_ascii_uppercase() {
            if matches!(previous, Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit()) {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            result.push(c);
        } else if (c == '_' || c == '-' || c.is_whitespace()) && !result.ends_with('_') {
            result.push('_');
        }
        previous = Some(c);
    }
    result.trim_matches('_').to_string()
}

/// Turns an under_scored or dashed word into its CamelCased form.
pub fn camelize(word: &str) -> String {
    word.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Turns an under_scored word into a human readable one.
pub fn humanize(word: &str) -> String {
    word.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derives a collection name from a type name.
///
/// Module paths are stripped, then the name is under_scored and
/// pluralized: `BlogPost` becomes `blog_posts`, `app::Person` becomes
/// `people`.
pub fn tableize(type_name: &str) -> String {
    let name = type_name.rsplit("::").next().unwrap_or(type_name);
    pluralize(&underscore(name))
}

/// Derives a type name from a collection name: `blog_posts` becomes
/// `BlogPost`.
pub fn classify(collection_name: &str) -> String {
    camelize(&singularize(collection_name))
}
