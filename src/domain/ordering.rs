//! Cue ordering and numbering
//!
//! Every function here works on anything that carries a cue number (see
//! [`Numbered`]), never mutates its input and performs no I/O.
//!
//! Reordering assigns a single new number to the moved cue instead of
//! renumbering its neighbours:
//!
//! | Target slot | New number |
//! |-------------|------------|
//! | first | first cue's prefix + `100` |
//! | last | next number in the last cue's section |
//! | between `prev` and `next` | `prev` prefix + `(prev + next) / 2` |
//!
//! When `prev` and `next` are consecutive the midpoint collapses onto
//! `prev` and the result duplicates an existing number. Nothing here
//! rebalances the section; [`find_duplicate`] lets callers detect it.

use std::cmp::Ordering;

use tracing::warn;

use super::cue_number::{next_prefix, normalize_prefix, CueNumber, CueNumberError};

/// Number handed out for the very first cue of a show
pub const FIRST_CUE_NUMBER: &str = "A101";

/// Suffix used when a cue is moved in front of the current first cue
pub const MOVE_TO_FRONT_NUMBER: u32 = 100;

/// Anything identified by a cue number string
pub trait Numbered {
    fn cue_number(&self) -> &str;
}

impl Numbered for str {
    fn cue_number(&self) -> &str {
        self
    }
}

impl Numbered for String {
    fn cue_number(&self) -> &str {
        self
    }
}

impl<T: Numbered + ?Sized> Numbered for &T {
    fn cue_number(&self) -> &str {
        (**self).cue_number()
    }
}

/// Compares two cues by `(prefix, number)`
///
/// A cue number that fails to parse is logged and compares equal to the
/// other side, so one bad record cannot abort a sort.
pub fn compare_cues<T: Numbered + ?Sized>(a: &T, b: &T) -> Ordering {
    match (a.cue_number().parse::<CueNumber>(), b.cue_number().parse::<CueNumber>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Err(error), _) | (_, Err(error)) => {
            warn!(%error, "Error sorting cues");
            Ordering::Equal
        }
    }
}

/// Returns the cues sorted by cue number, leaving the input untouched
///
/// The sort is stable. It is an insertion sort rather than `slice::sort_by`
/// because the lenient comparator is not a total order when malformed
/// numbers are present, and the standard sorts may panic on such input.
/// Sheets hold tens to low hundreds of cues.
pub fn sort_cues<T: Numbered + Clone>(cues: &[T]) -> Vec<T> {
    let mut sorted = cues.to_vec();
    for i in 1..sorted.len() {
        let mut j = i;
        while j > 0 && compare_cues(&sorted[j - 1], &sorted[j]) == Ordering::Greater {
            sorted.swap(j - 1, j);
            j -= 1;
        }
    }
    sorted
}

/// Returns the cue that sorts last, if any
fn last_in_order<T: Numbered>(cues: &[T]) -> Option<&T> {
    let refs: Vec<&T> = cues.iter().collect();
    sort_cues(&refs).last().copied()
}

/// Number for a new cue appended after everything else
///
/// `A101` for an empty sheet; otherwise the last number plus one, or the
/// start of the next section once the last suffix has reached `999`.
pub fn generate_next_cue_number<T: Numbered>(cues: &[T]) -> Result<String, CueNumberError> {
    let Some(last) = last_in_order(cues) else {
        return Ok(FIRST_CUE_NUMBER.to_string());
    };

    let last: CueNumber = last.cue_number().parse()?;
    if last.is_section_full() {
        return first_cue_number_for_prefix(next_prefix(last.prefix())?);
    }

    Ok(last.successor().to_string())
}

pub fn first_cue_number_for_prefix(prefix: char) -> Result<String, CueNumberError> {
    CueNumber::section_start(prefix).map(|n| n.to_string())
}

/// Cues in the given section; unparsable cue numbers are skipped
pub fn cues_with_prefix<T: Numbered>(cues: &[T], prefix: char) -> Vec<&T> {
    let prefix = prefix.to_ascii_uppercase();
    cues.iter()
        .filter(|cue| {
            cue.cue_number()
                .parse::<CueNumber>()
                .map(|n| n.prefix() == prefix)
                .unwrap_or(false)
        })
        .collect()
}

/// Last parsed number in a section; the latest of equal numbers wins
fn last_in_section<T: Numbered>(cues: &[T], prefix: char) -> Option<(&T, CueNumber)> {
    cues_with_prefix(cues, prefix)
        .into_iter()
        .filter_map(|cue| cue.cue_number().parse::<CueNumber>().ok().map(|n| (cue, n)))
        .max_by_key(|(_, n)| *n)
}

/// Next number in one section; never rolls over into another letter
pub fn next_cue_number_for_prefix<T: Numbered>(
    cues: &[T],
    prefix: char,
) -> Result<String, CueNumberError> {
    let prefix = normalize_prefix(prefix)?;
    match last_in_section(cues, prefix) {
        None => first_cue_number_for_prefix(prefix),
        Some((_, last)) => Ok(last.successor().to_string()),
    }
}

/// The stored cue number of the last cue in a section
pub fn last_cue_number_for_prefix<T: Numbered>(cues: &[T], prefix: char) -> Option<String> {
    last_in_section(cues, prefix).map(|(cue, _)| cue.cue_number().to_string())
}

/// Computes the number for a cue inserted at slot `index` of `sorted`
///
/// `sorted` is the current sheet in cue order without the cue being moved;
/// `index` ranges over `0..=sorted.len()`, larger values append.
pub fn cue_number_for_position<T: Numbered>(
    sorted: &[T],
    index: usize,
) -> Result<String, CueNumberError> {
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Ok(FIRST_CUE_NUMBER.to_string());
    };

    if index == 0 {
        let first: CueNumber = first.cue_number().parse()?;
        return Ok(first.with_number(MOVE_TO_FRONT_NUMBER).to_string());
    }

    if index >= sorted.len() {
        let last: CueNumber = last.cue_number().parse()?;
        return next_cue_number_for_prefix(sorted, last.prefix());
    }

    let prev: CueNumber = sorted[index - 1].cue_number().parse()?;
    let next: CueNumber = sorted[index].cue_number().parse()?;
    let midpoint = (u64::from(prev.number()) + u64::from(next.number())) / 2;

    // The midpoint of two u32 values always fits in u32
    Ok(prev.with_number(midpoint as u32).to_string())
}

/// Finds a cue whose number equals `cue_number`
pub fn find_duplicate<'a, T: Numbered>(cues: &'a [T], cue_number: &str) -> Option<&'a T> {
    let wanted = cue_number.parse::<CueNumber>().ok();
    cues.iter().find(|cue| match (&wanted, cue.cue_number().parse::<CueNumber>()) {
        (Some(wanted), Ok(n)) => *wanted == n,
        _ => cue.cue_number() == cue_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn numbers(cues: &[&str]) -> Vec<String> {
        cues.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sorts_by_prefix_then_numeric_suffix() {
        let cues = numbers(&["B101", "A100", "A99", "C101", "A101"]);
        let sorted = sort_cues(&cues);
        assert_eq!(sorted, numbers(&["A99", "A100", "A101", "B101", "C101"]));
    }

    #[test]
    fn sort_does_not_mutate_input() {
        let cues = numbers(&["B101", "A101"]);
        let _ = sort_cues(&cues);
        assert_eq!(cues, numbers(&["B101", "A101"]));
    }

    #[test]
    fn sort_is_stable_for_equal_numbers() {
        let cues = numbers(&["a101", "A102", "A101"]);
        assert_eq!(sort_cues(&cues), numbers(&["a101", "A101", "A102"]));
    }

    #[test]
    fn malformed_numbers_do_not_abort_sorting() {
        let cues = numbers(&["A102", "oops", "A101"]);
        let sorted = sort_cues(&cues);

        assert_eq!(sorted.len(), 3);
        assert!(sorted.contains(&"oops".to_string()));
    }

    #[test]
    fn malformed_number_keeps_its_relative_place() {
        // "oops" compares equal to both neighbours, so nothing moves past it
        let cues = numbers(&["B101", "oops", "A101"]);
        assert_eq!(sort_cues(&cues), cues);
    }

    #[test]
    fn first_cue_is_a101() {
        let empty: Vec<String> = vec![];
        assert_eq!(generate_next_cue_number(&empty).unwrap(), "A101");
    }

    #[test]
    fn next_number_increments_last_cue() {
        let cues = numbers(&["A102", "A101"]);
        assert_eq!(generate_next_cue_number(&cues).unwrap(), "A103");
    }

    #[test]
    fn next_number_after_full_section_starts_new_letter() {
        let cues = numbers(&["A999"]);
        assert_eq!(generate_next_cue_number(&cues).unwrap(), "B101");

        let cues = numbers(&["A101", "A1000"]);
        assert_eq!(generate_next_cue_number(&cues).unwrap(), "B101");
    }

    #[test]
    fn next_number_after_last_letter_is_an_error() {
        let cues = numbers(&["Z999"]);
        assert_eq!(
            generate_next_cue_number(&cues),
            Err(CueNumberError::PrefixExhausted('Z'))
        );
    }

    #[test]
    fn next_number_surfaces_a_malformed_last_cue() {
        let cues = numbers(&["bogus"]);
        assert!(matches!(
            generate_next_cue_number(&cues),
            Err(CueNumberError::InvalidFormat(_))
        ));
    }

    #[test]
    fn first_number_for_prefix() {
        assert_eq!(first_cue_number_for_prefix('d').unwrap(), "D101");
        assert!(first_cue_number_for_prefix('4').is_err());
    }

    #[test]
    fn filters_cues_by_prefix() {
        let cues = numbers(&["A101", "b101", "B102", "junk", "C101"]);
        let b: Vec<&String> = cues_with_prefix(&cues, 'b');
        assert_eq!(b, vec![&cues[1], &cues[2]]);
        assert!(cues_with_prefix(&cues, 'Q').is_empty());
    }

    #[test]
    fn next_number_for_empty_section_is_its_start() {
        let cues = numbers(&["A101", "A102"]);
        assert_eq!(next_cue_number_for_prefix(&cues, 'B').unwrap(), "B101");
    }

    #[test]
    fn next_number_for_prefix_stays_in_section() {
        let cues = numbers(&["A101", "A999", "B101"]);
        assert_eq!(next_cue_number_for_prefix(&cues, 'a').unwrap(), "A1000");
        assert_eq!(next_cue_number_for_prefix(&cues, 'B').unwrap(), "B102");
    }

    #[test]
    fn next_number_for_prefix_handles_front_numbers() {
        let cues = numbers(&["A100"]);
        assert_eq!(next_cue_number_for_prefix(&cues, 'A').unwrap(), "A101");
    }

    #[test]
    fn last_number_for_prefix() {
        let cues = numbers(&["A103", "a105", "B101"]);
        assert_eq!(last_cue_number_for_prefix(&cues, 'A').as_deref(), Some("a105"));
        assert_eq!(last_cue_number_for_prefix(&cues, 'C'), None);
    }

    #[test]
    fn moving_to_front_uses_suffix_100() {
        let sorted = numbers(&["A101", "A102"]);
        assert_eq!(cue_number_for_position(&sorted, 0).unwrap(), "A100");

        let sorted = numbers(&["B101"]);
        assert_eq!(cue_number_for_position(&sorted, 0).unwrap(), "B100");
    }

    #[test]
    fn moving_to_end_appends_to_last_section() {
        let sorted = numbers(&["A101", "B101", "B102"]);
        assert_eq!(cue_number_for_position(&sorted, 3).unwrap(), "B103");
        assert_eq!(cue_number_for_position(&sorted, 42).unwrap(), "B103");
    }

    #[test]
    fn moving_between_takes_the_midpoint() {
        let sorted = numbers(&["A101", "A103"]);
        assert_eq!(cue_number_for_position(&sorted, 1).unwrap(), "A102");

        let sorted = numbers(&["A101", "A201"]);
        assert_eq!(cue_number_for_position(&sorted, 1).unwrap(), "A151");
    }

    #[test]
    fn moving_between_consecutive_numbers_collapses_onto_previous() {
        let sorted = numbers(&["A101", "A102"]);
        let number = cue_number_for_position(&sorted, 1).unwrap();

        assert_eq!(number, "A101");
        assert_eq!(find_duplicate(&sorted, &number), Some(&sorted[0]));
    }

    #[test]
    fn moving_between_sections_keeps_previous_prefix() {
        let sorted = numbers(&["A999", "B101"]);
        assert_eq!(cue_number_for_position(&sorted, 1).unwrap(), "A550");
    }

    #[test]
    fn moving_into_empty_sheet_starts_at_a101() {
        let empty: Vec<String> = vec![];
        assert_eq!(cue_number_for_position(&empty, 0).unwrap(), "A101");
    }

    #[test]
    fn find_duplicate_compares_parsed_numbers() {
        let cues = numbers(&["A101", "B0102"]);
        assert_eq!(find_duplicate(&cues, "b102"), Some(&cues[1]));
        assert_eq!(find_duplicate(&cues, "A102"), None);
    }

    fn cue_number() -> impl Strategy<Value = String> {
        prop_oneof![
            9 => (proptest::char::range('A', 'E'), 1u32..1200)
                .prop_map(|(p, n)| format!("{}{}", p, n)),
            1 => "[a-z#]{0,3}",
        ]
    }

    proptest! {
        #[test]
        fn sort_is_a_permutation(cues in proptest::collection::vec(cue_number(), 0..40)) {
            let mut sorted = sort_cues(&cues);
            let mut original = cues.clone();
            sorted.sort();
            original.sort();
            prop_assert_eq!(sorted, original);
        }

        #[test]
        fn sort_is_non_decreasing_for_valid_numbers(
            cues in proptest::collection::vec(
                (proptest::char::range('A', 'E'), 1u32..1200)
                    .prop_map(|(p, n)| format!("{}{}", p, n)),
                0..40,
            )
        ) {
            let sorted = sort_cues(&cues);
            for pair in sorted.windows(2) {
                let a: CueNumber = pair[0].parse().unwrap();
                let b: CueNumber = pair[1].parse().unwrap();
                prop_assert!(a <= b);
            }
        }

        #[test]
        fn gap_insertion_sorts_between_neighbours(prev in 101u32..900, gap in 2u32..99) {
            let sorted = vec![format!("A{}", prev), format!("A{}", prev + gap)];
            let number: CueNumber = cue_number_for_position(&sorted, 1).unwrap().parse().unwrap();
            prop_assert!(number > sorted[0].parse::<CueNumber>().unwrap());
            prop_assert!(number < sorted[1].parse::<CueNumber>().unwrap());
        }
    }
}
