use std::collections::HashMap;

use rgb::RGB8;

use crate::model::command::PatternCommand;

/// Built-in effects, in the order they are presented to clients.
const BUILTIN_PATTERNS: &[(&str, &str)] = &[
    (
        "Valentines: My Heart Is Yours",
        "patternType=fade&num_zones=1&zones={zone}&num_colors=3&colors=255,10,228,255,255,255,255,0,0,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Valentines: Cupids Twinkle",
        "patternType=twinkle&num_zones=1&zones={zone}&num_colors=2&colors=255,10,228,255,255,255,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Valentines: Powerful Love",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=2&colors=180,10,255,255,0,0,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Valentines: Adorations Smile",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=3&colors=255,10,228,255,0,76,255,143,238,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Pride: March",
        "patternType=march&num_zones=1&zones={zone}&num_colors=18&colors=255,0,0,255,0,0,255,0,0,255,50,0,255,50,0,255,50,0,255,240,0,255,240,0,255,240,0,0,255,0,0,255,0,0,255,0,0,0,255,0,0,255,0,0,255,125,0,255,125,0,255,125,0,255,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Pride: Split",
        "patternType=split&num_zones=1&zones={zone}&num_colors=6&colors=255,0,0,255,50,0,255,240,0,0,255,0,0,0,255,125,0,255,&direction=R&speed=1&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Icicle Chase",
        "patternType=chase&num_zones=1&zones={zone}&num_colors=3&colors=255,255,255,0,183,245,0,73,245,&direction=R&speed=5&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Icicle Stream",
        "patternType=river&num_zones=1&zones={zone}&num_colors=4&colors=255,255,255,0,204,255,0,70,255,0,70,255,&direction=R&speed=4&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Icicle Shimmer",
        "patternType=twinkle&num_zones=1&zones={zone}&num_colors=4&colors=255,255,255,0,204,255,0,70,255,0,70,255,&direction=R&speed=4&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Candy Cane Lane",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=6&colors=255,255,255,255,255,255,255,255,255,255,0,0,255,0,0,255,0,0,&direction=R&speed=4&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Candy Cane Glimmer",
        "patternType=river&num_zones=1&zones={zone}&num_colors=4&colors=255,255,255,255,0,0,255,255,255,255,0,0,&direction=R&speed=20&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Christmas Glow",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=6&colors=255,255,255,255,255,255,255,255,255,255,153,0,255,153,0,255,153,0,&direction=R&speed=2&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: The Grinch Stole Christmas",
        "patternType=twinkle&num_zones=1&zones={zone}&num_colors=8&colors=15,255,0,15,255,0,15,255,0,15,255,0,255,0,0,255,0,0,255,255,255,255,255,255,&direction=R&speed=2&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Christmas at Oelo",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=7&colors=26,213,255,26,213,255,26,213,255,26,213,255,26,213,255,255,34,0,255,34,0,&direction=R&speed=2&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Saturnalia Christmas",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=9&colors=255,255,255,255,255,255,255,255,255,0,255,47,0,255,47,0,255,47,255,0,0,255,0,0,255,0,0,&direction=R&speed=2&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Dreaming of a White Christmas",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=5&colors=238,252,255,237,252,255,237,252,255,0,0,0,0,0,0,&direction=R&speed=10&gap=0&other=0&pause=0",
    ),
    (
        "Christmas: Decorating the Christmas Tree",
        "patternType=stationary&num_zones=1&zones={zone}&num_colors=5&colors=0,219,11,0,219,11,0,219,11,255,153,0,255,255,255,&direction=R&speed=2&gap=0&other=0&pause=0",
    ),
];

#[derive(Clone, Debug)]
pub struct Effect {
    pub name: String,
    pub template: PatternCommand,
}

type PatternKey = (String, Vec<[u8; 3]>);

/// Named effects, with a reverse index from (pattern type, exact colors) to
/// effect name.
#[derive(Clone, Debug, Default)]
pub struct PatternCatalog {
    effects: Vec<Effect>,
    /// `None` marks a key shared by several effects
    index: HashMap<PatternKey, Option<usize>>,
}

fn pattern_key(cmd: &PatternCommand) -> PatternKey {
    (
        cmd.pattern_type.clone(),
        cmd.colors.iter().map(|c: &RGB8| [c.r, c.g, c.b]).collect(),
    )
}

impl PatternCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN_PATTERNS.iter().copied())
    }

    /// Build a catalog from (name, url query template) pairs. Templates
    /// without a pattern type are skipped.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut res = Self::default();

        for (name, template) in entries {
            let Some(template) = PatternCommand::from_query(template) else {
                log::error!("Effect {name:?} has no pattern type, skipping");
                continue;
            };

            if res.lookup(name).is_some() {
                log::warn!("Duplicate effect {name:?}, keeping first definition");
                continue;
            }

            let idx = res.effects.len();
            res.index
                .entry(pattern_key(&template))
                .and_modify(|slot| *slot = None)
                .or_insert(Some(idx));

            res.effects.push(Effect {
                name: name.to_string(),
                template,
            });
        }

        res
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&PatternCommand> {
        self.effects
            .iter()
            .find(|eff| eff.name == name)
            .map(|eff| &eff.template)
    }

    /// Effect names, in catalog order
    pub fn list_effects(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(|eff| eff.name.as_str())
    }

    /// Find the effect whose template has exactly this pattern type and
    /// (unscaled) color list. Never guesses: ambiguous or partial matches
    /// yield `None`.
    #[must_use]
    pub fn reverse_lookup(&self, cmd: &PatternCommand) -> Option<&str> {
        let idx = (*self.index.get(&pattern_key(cmd))?)?;
        Some(self.effects[idx].name.as_str())
    }
}
