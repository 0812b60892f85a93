/// Seconds a player has to answer each question.
pub const QUESTION_BUDGET_SECS: f64 = 10.0;

/// Points awarded for an answer, scaled by how fast it came in.
///
/// Incorrect answers (and timeouts) are worth 0. A correct answer earns the
/// remaining time multiplied by a speed tier, rounded, with a floor of 1 so
/// a correct answer at the last instant still counts.
pub fn score_answer(correct: bool, elapsed_seconds: f64) -> u32 {
    score_answer_with_budget(correct, elapsed_seconds, QUESTION_BUDGET_SECS)
}

pub fn score_answer_with_budget(correct: bool, elapsed_seconds: f64, budget_seconds: f64) -> u32 {
    if !correct {
        return 0;
    }
    let remaining = (budget_seconds - elapsed_seconds).max(0.0);
    let raw = (remaining * speed_multiplier(elapsed_seconds)).round() as u32;
    raw.max(1)
}

/// Tier boundaries are inclusive on the fast side: exactly 2s still gets x2,
/// exactly 5s still gets x1.5.
fn speed_multiplier(elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 2.0 {
        2.0
    } else if elapsed_seconds <= 5.0 {
        1.5
    } else if elapsed_seconds <= 9.0 {
        1.0
    } else {
        0.5
    }
}
