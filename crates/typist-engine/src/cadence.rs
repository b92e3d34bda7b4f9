//! Cadence generation.
//!
//! Maps a profile and a position in the text to the delay before the next
//! keystroke and the behaviours injected around it. All randomness comes from
//! a single `StdRng`, so a fixed seed reproduces a session exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use typist_core::config::CadenceConfig;
use typist_core::types::Profile;

/// Longest wrong fragment typed in delayed-correction mode.
const MAX_FRAGMENT_CHARS: usize = 6;

/// One behaviour scheduled for a character tick, in execution order.
#[derive(Clone, Debug, PartialEq)]
pub enum CadenceAction {
    /// Type the current character.
    TypeChar,
    /// Type `wrong`, wait `reaction_ms`, backspace it and type the current character.
    TypeTypoThenFix { wrong: char, reaction_ms: u64 },
    /// Type `wrong_fragment` in place of `correct_fragment` and fix it once
    /// typing has moved `lookahead` characters past it.
    TypeTypoThenScheduleFix {
        wrong_fragment: String,
        correct_fragment: String,
        lookahead: usize,
    },
    NaturalPause { duration_ms: u64 },
    ZoneOut { duration_ms: u64 },
    MicroHesitation { duration_ms: u64 },
    /// Type a draft phrase that will be deleted again.
    AiFillerBegin { phrase: String },
    /// Pause, then delete the draft phrase.
    AiFillerEnd { pause_ms: u64 },
}

impl CadenceAction {
    /// Whether this action consumes characters of the input text.
    pub fn advances(&self) -> bool {
        matches!(
            self,
            CadenceAction::TypeChar
                | CadenceAction::TypeTypoThenFix { .. }
                | CadenceAction::TypeTypoThenScheduleFix { .. }
        )
    }

    pub fn is_typo(&self) -> bool {
        matches!(
            self,
            CadenceAction::TypeTypoThenFix { .. } | CadenceAction::TypeTypoThenScheduleFix { .. }
        )
    }
}

/// Delay before a tick plus its actions. The last action always advances.
#[derive(Clone, Debug, PartialEq)]
pub struct CadenceStep {
    pub delay_ms: u64,
    pub actions: Vec<CadenceAction>,
}

/// Session facts the generator needs at a tick.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    pub text: &'a [char],
    pub position: usize,
    pub delayed_correction: bool,
    /// False while the correction queue is at capacity.
    pub correction_slots_free: bool,
    pub filler_pending: bool,
}

/// Produces cadence steps for a session.
pub struct CadenceGenerator {
    config: CadenceConfig,
    rng: StdRng,
}

impl CadenceGenerator {
    /// Create a generator. `seed` makes the sequence reproducible.
    pub fn new(config: CadenceConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &CadenceConfig {
        &self.config
    }

    /// Compute the next step for the character at `ctx.position`.
    pub fn next_step(&mut self, profile: &Profile, ctx: &TickContext<'_>) -> CadenceStep {
        let delay_ms = self.keystroke_delay(profile);
        let mut actions = Vec::new();

        if ctx.filler_pending && profile.ai_filler_enabled {
            if let Some(phrase) = self.filler_phrase() {
                let pause_ms = self.between(
                    self.config.filler_pause_ms_min,
                    self.config.filler_pause_ms_max,
                );
                actions.push(CadenceAction::AiFillerBegin { phrase });
                actions.push(CadenceAction::AiFillerEnd { pause_ms });
            }
        }

        if profile.pause_frequency > 0 && self.chance(1.0 / profile.pause_frequency as f64) {
            let duration_ms = self.between(
                self.config.natural_pause_ms_min,
                self.config.natural_pause_ms_max,
            );
            actions.push(CadenceAction::NaturalPause { duration_ms });
        }

        if profile.zone_out_enabled && self.chance(profile.zone_out_chance) {
            let duration_ms = self.between(self.config.zone_out_ms_min, self.config.zone_out_ms_max);
            actions.push(CadenceAction::ZoneOut { duration_ms });
        }

        if profile.micro_hesitations_enabled && self.chance(profile.micro_hesitation_chance) {
            let duration_ms = self.between(
                self.config.micro_hesitation_ms_min,
                self.config.micro_hesitation_ms_max,
            );
            actions.push(CadenceAction::MicroHesitation { duration_ms });
        }

        actions.push(self.keystroke_action(profile, ctx));
        CadenceStep { delay_ms, actions }
    }

    /// Base per-keystroke delay: uniform in the profile bounds, then widened
    /// by up to `burst_variability` either way.
    pub fn keystroke_delay(&mut self, profile: &Profile) -> u64 {
        let base = self.between(profile.min_delay_ms, profile.max_delay_ms) as f64;
        let spread = if profile.burst_variability.is_finite() {
            profile.burst_variability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let jitter = if spread > 0.0 {
            self.rng.random_range(-spread..=spread)
        } else {
            0.0
        };
        (base * (1.0 + jitter)).max(0.0).round() as u64
    }

    /// Delay between consecutive backspaces.
    pub fn backspace_delay(&mut self, profile: &Profile) -> u64 {
        self.between(profile.min_delay_ms / 2, profile.max_delay_ms / 2)
    }

    /// Time between noticing a typo and starting to fix it.
    pub fn typo_reaction_ms(&mut self) -> u64 {
        self.between(
            self.config.typo_reaction_ms_min,
            self.config.typo_reaction_ms_max,
        )
    }

    fn keystroke_action(&mut self, profile: &Profile, ctx: &TickContext<'_>) -> CadenceAction {
        let Some(&current) = ctx.text.get(ctx.position) else {
            return CadenceAction::TypeChar;
        };
        if !profile.typos_enabled
            || !ctx.correction_slots_free
            || !self.chance(profile.typo_chance)
        {
            return CadenceAction::TypeChar;
        }

        if ctx.delayed_correction {
            if let Some(action) = self.delayed_typo(ctx) {
                return action;
            }
        }

        // Keys without neighbours are double-struck.
        let wrong = adjacent_key(current, &mut self.rng).unwrap_or(current);
        CadenceAction::TypeTypoThenFix {
            wrong,
            reaction_ms: self.typo_reaction_ms(),
        }
    }

    fn delayed_typo(&mut self, ctx: &TickContext<'_>) -> Option<CadenceAction> {
        let correct: Vec<char> = ctx.text[ctx.position..]
            .iter()
            .take_while(|c| c.is_alphanumeric())
            .take(MAX_FRAGMENT_CHARS)
            .copied()
            .collect();
        if correct.is_empty() {
            return None;
        }
        let wrong = fragment_typo(&correct, &mut self.rng)?;
        let lookahead = self.between(
            self.config.correction_lookahead_min as u64,
            self.config.correction_lookahead_max as u64,
        ) as usize;
        Some(CadenceAction::TypeTypoThenScheduleFix {
            wrong_fragment: wrong.into_iter().collect(),
            correct_fragment: correct.into_iter().collect(),
            lookahead,
        })
    }

    fn filler_phrase(&mut self) -> Option<String> {
        let phrases = &self.config.filler_phrases;
        if phrases.is_empty() {
            return None;
        }
        let idx = self.rng.random_range(0..phrases.len());
        Some(phrases[idx].clone())
    }

    fn chance(&mut self, probability: f64) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            return false;
        }
        self.rng.random_bool(probability.min(1.0))
    }

    fn between(&mut self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(lo..=hi)
    }
}

/// Keys physically next to `key` on a QWERTY layout.
fn qwerty_neighbours(key: char) -> Option<&'static str> {
    let neighbours = match key {
        'q' => "wa",
        'w' => "qeas",
        'e' => "wrsd",
        'r' => "etdf",
        't' => "ryfg",
        'y' => "tugh",
        'u' => "yihj",
        'i' => "uojk",
        'o' => "ipkl",
        'p' => "ol",
        'a' => "qwsz",
        's' => "awedxz",
        'd' => "serfcx",
        'f' => "drtgvc",
        'g' => "ftyhbv",
        'h' => "gyujnb",
        'j' => "huikmn",
        'k' => "jiolm",
        'l' => "kop",
        'z' => "asx",
        'x' => "zsdc",
        'c' => "xdfv",
        'v' => "cfgb",
        'b' => "vghn",
        'n' => "bhjm",
        'm' => "njk",
        '1' => "2q",
        '2' => "13w",
        '3' => "24e",
        '4' => "35r",
        '5' => "46t",
        '6' => "57y",
        '7' => "68u",
        '8' => "79i",
        '9' => "80o",
        '0' => "9p",
        _ => return None,
    };
    Some(neighbours)
}

/// Pick a neighbouring key, keeping the case of `key`.
pub fn adjacent_key<R: Rng + ?Sized>(key: char, rng: &mut R) -> Option<char> {
    let neighbours: Vec<char> = qwerty_neighbours(key.to_ascii_lowercase())?
        .chars()
        .collect();
    let picked = neighbours[rng.random_range(0..neighbours.len())];
    if key.is_ascii_uppercase() {
        Some(picked.to_ascii_uppercase())
    } else {
        Some(picked)
    }
}

/// A misspelling of `correct` with the same length: swap two differing
/// adjacent letters, or substitute one letter with a neighbouring key.
fn fragment_typo<R: Rng + ?Sized>(correct: &[char], rng: &mut R) -> Option<Vec<char>> {
    let swappable: Vec<usize> = (0..correct.len().saturating_sub(1))
        .filter(|&i| correct[i] != correct[i + 1])
        .collect();
    let mut wrong = correct.to_vec();
    if !swappable.is_empty() {
        let idx = swappable[rng.random_range(0..swappable.len())];
        wrong.swap(idx, idx + 1);
        return Some(wrong);
    }

    let idx = rng.random_range(0..correct.len());
    let replacement = adjacent_key(correct[idx], rng)?;
    wrong[idx] = replacement;
    Some(wrong)
}
