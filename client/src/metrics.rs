use shared::protocol::PlayerProgress;
use shared::wpm;

/// Accuracy a run must hold at full-length input to count as complete.
/// Blocks spammers who mash through the text just to trigger a finish.
pub const MIN_ACCURACY_TO_FINISH: u8 = 70;

/// Adapter over the local typing engine: fed the raw input-so-far on each
/// keystroke, it produces the [`PlayerProgress`] snapshots the session
/// broadcasts. Mistakes are counted when first typed and survive
/// corrections, so accuracy reflects every attempt, not the final buffer.
#[derive(Debug, Clone)]
pub struct TypingMeter {
    target: Vec<char>,
    input: Vec<char>,
    mistakes: u32,
    started_at_ms: Option<u64>,
}

impl TypingMeter {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.chars().collect(),
            input: Vec::new(),
            mistakes: 0,
            started_at_ms: None,
        }
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Feed the raw input-so-far after a keystroke. Input beyond the target
    /// length is ignored; the first keystroke starts the clock.
    pub fn record_input(&mut self, input: &str, now_ms: u64) {
        let typed: Vec<char> = input.chars().collect();
        if typed.len() > self.target.len() {
            return;
        }
        if self.started_at_ms.is_none() && !typed.is_empty() {
            self.started_at_ms = Some(now_ms);
        }
        // a freshly appended character that misses the target is a mistake
        // forever; deleting it does not un-count it
        if typed.len() > self.input.len() {
            let idx = typed.len() - 1;
            if typed[idx] != self.target[idx] {
                self.mistakes += 1;
            }
        }
        self.input = typed;
    }

    fn correct_chars(&self) -> u32 {
        self.input
            .iter()
            .zip(self.target.iter())
            .filter(|(typed, expected)| typed == expected)
            .count() as u32
    }

    pub fn accuracy(&self) -> u8 {
        let attempts = self.input.len() as u32 + self.mistakes;
        wpm::accuracy_percent(self.mistakes, attempts)
    }

    pub fn progress_percent(&self) -> u8 {
        if self.target.is_empty() {
            return 0;
        }
        ((self.input.len() as f64 / self.target.len() as f64) * 100.0).round() as u8
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> f64 {
        match self.started_at_ms {
            Some(start) => now_ms.saturating_sub(start) as f64 / 1000.0,
            None => 0.0,
        }
    }

    /// Full-length input that held the accuracy floor. Reaching the end of
    /// the text below the floor is NOT completion.
    pub fn is_complete(&self) -> bool {
        !self.input.is_empty()
            && self.input.len() == self.target.len()
            && self.accuracy() >= MIN_ACCURACY_TO_FINISH
    }

    /// Live snapshot for broadcast. Never marks `finished`; the session
    /// stamps the finish fields when [`TypingMeter::is_complete`] flips.
    pub fn snapshot(&self, now_ms: u64) -> PlayerProgress {
        let elapsed = self.elapsed_secs(now_ms);
        PlayerProgress {
            progress: self.progress_percent(),
            wpm: wpm::rounded_wpm(self.correct_chars(), elapsed),
            accuracy: self.accuracy(),
            correct_chars: self.correct_chars(),
            incorrect_chars: self.mistakes,
            elapsed_time: elapsed,
            finished: false,
            finish_time: None,
        }
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.mistakes = 0;
        self.started_at_ms = None;
    }

    /// Swap in a new passage (rematch or difficulty change) and start over.
    pub fn retarget(&mut self, target: &str) {
        self.target = target.chars().collect();
        self.reset();
    }
}
