//! Labelled-sequence automaton for multiword recognition
//!
//! A deterministic finite-state matcher scans a sentence and merges the
//! longest accepted run of words starting at each position into a single
//! multiword. What counts as a token, which runs are acceptable and which
//! analysis the result gets is decided by an [`AutomatonPolicy`]:
//! [`locutions::LocutionPolicy`] for fixed phrases and
//! [`proper_nouns::ProperNounPolicy`] for capitalised named entities.
//!
//! Per-scan mutable state lives in the policy's `Context` type, created fresh
//! for every sentence, so one automaton can be shared across threads.

pub mod locutions;
pub mod proper_nouns;

pub use locutions::LocutionPolicy;
pub use proper_nouns::{ProperNounConfig, ProperNounPolicy};

use rustc_hash::FxHashSet;

use crate::types::{Sentence, Word};

/// Automaton state identifier.
pub type StateId = usize;
/// Token class identifier, as computed by [`AutomatonPolicy::compute_token`].
pub type TokenId = usize;

// ============================================================================
// TransitionTable
// ============================================================================

/// A total transition function: unmapped pairs lead to the stop state.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    n_tokens: usize,
    table: Vec<StateId>,
    initial: StateId,
    stop: StateId,
    finals: FxHashSet<StateId>,
}

impl TransitionTable {
    /// Create a table for states `0..n_states` and tokens `0..n_tokens`,
    /// with every transition going to `stop`.
    pub fn new(n_states: usize, n_tokens: usize, initial: StateId, stop: StateId) -> Self {
        Self {
            n_tokens,
            table: vec![stop; n_states * n_tokens],
            initial,
            stop,
            finals: FxHashSet::default(),
        }
    }

    /// Mark a state as final.
    pub fn with_final(mut self, state: StateId) -> Self {
        self.finals.insert(state);
        self
    }

    /// Set the transition `from --token--> to`.
    pub fn set(&mut self, from: StateId, token: TokenId, to: StateId) {
        self.table[from * self.n_tokens + token] = to;
    }

    /// Set the same target for several tokens.
    pub fn set_all(&mut self, from: StateId, tokens: &[TokenId], to: StateId) {
        for &t in tokens {
            self.set(from, t, to);
        }
    }

    pub fn next(&self, from: StateId, token: TokenId) -> StateId {
        if token >= self.n_tokens {
            return self.stop;
        }
        self.table
            .get(from * self.n_tokens + token)
            .copied()
            .unwrap_or(self.stop)
    }

    pub fn initial(&self) -> StateId {
        self.initial
    }

    pub fn stop(&self) -> StateId {
        self.stop
    }

    pub fn is_final(&self, state: StateId) -> bool {
        self.finals.contains(&state)
    }
}

// ============================================================================
// Policy trait
// ============================================================================

/// Hooks that specialise the generic scan loop.
///
/// # Contract
///
/// - `compute_token` is called once per visited word, in order, starting at
///   the candidate start position; it may record anything it needs in the
///   context.
/// - `reset_actions` is called before every scan and after a rejected match.
/// - `valid_multiword` sees the candidate multiword (its components are the
///   matched words) and may store the analyses it wants to assign.
/// - `set_multiword_analysis` fills the analyses of an accepted multiword.
pub trait AutomatonPolicy {
    /// Per-scan accumulator state.
    type Context: Default;

    fn table(&self) -> &TransitionTable;

    /// Classify `words[j]` given the current state.
    fn compute_token(
        &self,
        ctx: &mut Self::Context,
        state: StateId,
        words: &[Word],
        j: usize,
    ) -> TokenId;

    fn reset_actions(&self, ctx: &mut Self::Context) {
        *ctx = Self::Context::default();
    }

    /// Side effects on entering `state` from `origin` through `token`.
    fn state_actions(
        &self,
        _ctx: &mut Self::Context,
        _origin: StateId,
        _state: StateId,
        _token: TokenId,
        _word: &Word,
    ) {
    }

    fn valid_multiword(&self, _ctx: &mut Self::Context, _candidate: &Word) -> bool {
        true
    }

    fn set_multiword_analysis(&self, ctx: &Self::Context, word: &mut Word, final_state: StateId);

    /// If `true`, accepted runs are annotated word by word instead of merged.
    fn split_multiwords(&self) -> bool {
        false
    }

    /// Annotate one word of an accepted run in split mode.
    fn set_split_analysis(&self, _ctx: &Self::Context, _word: &mut Word) {}
}

// ============================================================================
// Automaton
// ============================================================================

/// Outcome of a match attempt at one start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No final state was reached.
    NoMatch,
    /// A run was found but the policy rejected it; the sentence is untouched.
    Rejected { end: usize },
    /// The run `start..=end` was merged (or annotated in split mode).
    Built { end: usize },
}

impl MatchOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, Self::Built { .. })
    }
}

/// Generic longest-match scanner driven by a policy.
#[derive(Debug, Clone)]
pub struct Automaton<P> {
    policy: P,
}

impl<P: AutomatonPolicy> Automaton<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Scan the whole sentence, merging every accepted run.
    ///
    /// Returns the number of multiwords built.
    pub fn annotate(&self, sentence: &mut Sentence) -> usize {
        let mut ctx = P::Context::default();
        let mut built = 0;
        let mut i = 0;
        while i < sentence.words.len() {
            let outcome = self.match_at(&mut ctx, sentence, i);
            if let MatchOutcome::Built { end } = outcome {
                built += 1;
                if self.policy.split_multiwords() {
                    i = end;
                }
            }
            i += 1;
        }
        if built > 0 {
            tracing::debug!(built, words = sentence.words.len(), "multiwords built");
        }
        built
    }

    /// Attempt a single match starting at `pos`. Returns `true` if a
    /// multiword was built there.
    pub fn annotate_at(&self, sentence: &mut Sentence, pos: usize) -> bool {
        let mut ctx = P::Context::default();
        self.match_at(&mut ctx, sentence, pos).is_built()
    }

    /// Run the automaton from `start` and return the longest final position
    /// together with the final state reached there.
    fn scan(&self, ctx: &mut P::Context, words: &[Word], start: usize) -> Option<(usize, StateId)> {
        let table = self.policy.table();
        let mut state = table.initial();
        let mut longest = None;
        let mut j = start;
        while state != table.stop() && j < words.len() {
            let token = self.policy.compute_token(ctx, state, words, j);
            let next = table.next(state, token);
            self.policy.state_actions(ctx, state, next, token, &words[j]);
            state = next;
            if table.is_final(state) {
                longest = Some((j, state));
            }
            j += 1;
        }
        longest
    }

    fn match_at(&self, ctx: &mut P::Context, sentence: &mut Sentence, start: usize) -> MatchOutcome {
        if start >= sentence.words.len() {
            return MatchOutcome::NoMatch;
        }
        self.policy.reset_actions(ctx);
        match self.scan(ctx, &sentence.words, start) {
            None => MatchOutcome::NoMatch,
            Some((end, final_state)) => self.build_multiword(ctx, sentence, start, end, final_state),
        }
    }

    fn build_multiword(
        &self,
        ctx: &mut P::Context,
        sentence: &mut Sentence,
        start: usize,
        end: usize,
        final_state: StateId,
    ) -> MatchOutcome {
        // an existing multiword matching on its own is already a unit
        if start == end && sentence.words[start].is_multiword() && !self.policy.split_multiwords() {
            self.policy.reset_actions(ctx);
            return MatchOutcome::NoMatch;
        }

        let components = sentence.words[start..=end].to_vec();
        let form = components
            .iter()
            .map(|w| w.form.as_str())
            .collect::<Vec<_>>()
            .join("_");
        let mut candidate = Word::multiword(form, components);

        if !self.policy.valid_multiword(ctx, &candidate) {
            tracing::trace!(form = %candidate.form, "multiword rejected");
            self.policy.reset_actions(ctx);
            return MatchOutcome::Rejected { end };
        }

        if self.policy.split_multiwords() {
            for word in &mut sentence.words[start..=end] {
                self.policy.set_split_analysis(ctx, word);
            }
            self.policy.reset_actions(ctx);
            return MatchOutcome::Built { end };
        }

        self.policy
            .set_multiword_analysis(ctx, &mut candidate, final_state);
        tracing::trace!(form = %candidate.form, "multiword built");
        sentence
            .words
            .splice(start..=end, std::iter::once(candidate));
        MatchOutcome::Built { end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Analysis;
    use proptest::prelude::*;

    // Accepts runs of "x" words; rejects runs of exactly `reject_len` words.
    struct RunOfX {
        table: TransitionTable,
        reject_len: usize,
    }

    const IN: StateId = 0;
    const RUN: StateId = 1;
    const STOP: StateId = 2;
    const TK_X: TokenId = 0;
    const TK_OTHER: TokenId = 1;

    #[derive(Default)]
    struct Count {
        n: usize,
        resets: usize,
    }

    impl RunOfX {
        fn new(reject_len: usize) -> Self {
            let mut table = TransitionTable::new(3, 2, IN, STOP).with_final(RUN);
            table.set(IN, TK_X, RUN);
            table.set(RUN, TK_X, RUN);
            Self { table, reject_len }
        }
    }

    impl AutomatonPolicy for RunOfX {
        type Context = Count;

        fn table(&self) -> &TransitionTable {
            &self.table
        }

        fn compute_token(&self, ctx: &mut Count, _state: StateId, words: &[Word], j: usize) -> TokenId {
            if words[j].form == "x" {
                ctx.n += 1;
                TK_X
            } else {
                TK_OTHER
            }
        }

        fn reset_actions(&self, ctx: &mut Count) {
            ctx.n = 0;
            ctx.resets += 1;
        }

        fn valid_multiword(&self, _ctx: &mut Count, candidate: &Word) -> bool {
            candidate.components().len() != self.reject_len
        }

        fn set_multiword_analysis(&self, _ctx: &Count, word: &mut Word, _final_state: StateId) {
            word.add_analysis(Analysis::new(word.form.clone(), "RUN"));
        }
    }

    #[test]
    fn test_transition_table_defaults_to_stop() {
        let t = RunOfX::new(0).table;
        assert_eq!(t.next(IN, TK_X), RUN);
        assert_eq!(t.next(IN, TK_OTHER), STOP);
        assert_eq!(t.next(RUN, 17), STOP);
        assert!(t.is_final(RUN));
        assert!(!t.is_final(IN));
    }

    #[test]
    fn test_longest_match_wins() {
        let a = Automaton::new(RunOfX::new(0));
        let mut s = Sentence::from_forms(&["a", "x", "x", "x", "b", "x"]);
        let built = a.annotate(&mut s);
        assert_eq!(built, 2);
        assert_eq!(s.forms(), vec!["a", "x_x_x", "b", "x"]);
        assert_eq!(s.words[1].tag(), "RUN");
        assert_eq!(s.words[1].components().len(), 3);
        // the trailing single x became a one-word multiword
        assert!(s.words[3].is_multiword());
    }

    #[test]
    fn test_rejection_leaves_sentence_untouched_and_moves_on() {
        let a = Automaton::new(RunOfX::new(2));
        let mut s = Sentence::from_forms(&["x", "x", "y"]);
        let before = s.clone();
        assert!(!a.annotate_at(&mut s, 0));
        assert_eq!(s, before);

        // full scan: run at 0 is rejected, scan resumes at 1 with a 1-word run
        let built = a.annotate(&mut s);
        assert_eq!(built, 1);
        assert_eq!(s.forms(), vec!["x", "x", "y"]);
        assert!(!s.words[0].is_multiword());
        assert!(s.words[1].is_multiword());
    }

    #[test]
    fn test_annotate_at_reports_build() {
        let a = Automaton::new(RunOfX::new(0));
        let mut s = Sentence::from_forms(&["y", "x", "x"]);
        assert!(!a.annotate_at(&mut s, 0));
        assert!(a.annotate_at(&mut s, 1));
        assert_eq!(s.forms(), vec!["y", "x_x"]);
        assert!(!a.annotate_at(&mut s, 5));
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let a = Automaton::new(RunOfX::new(0));
        let mut s = Sentence::from_forms(&["x", "y", "x", "x"]);
        a.annotate(&mut s);
        let once = s.clone();
        assert_eq!(a.annotate(&mut s), 0);
        assert_eq!(s, once);
    }

    #[test]
    fn test_empty_sentence() {
        let a = Automaton::new(RunOfX::new(0));
        let mut s = Sentence::default();
        assert_eq!(a.annotate(&mut s), 0);
    }

    proptest! {
        #[test]
        fn prop_rejected_match_leaves_sentence_equal(forms in prop::collection::vec(
            prop::sample::select(vec!["x", "y"]), 1..10)) {
            let run = forms.iter().take_while(|f| **f == "x").count();
            prop_assume!(run > 0);
            let a = Automaton::new(RunOfX::new(run));
            let mut s = Sentence::from_forms(&forms);
            let before = s.clone();
            prop_assert!(!a.annotate_at(&mut s, 0));
            prop_assert_eq!(s, before);
        }
    }
}
