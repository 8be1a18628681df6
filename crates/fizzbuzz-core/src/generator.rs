//! FizzBuzz sequence generation

use crate::query::FizzBuzzQuery;

/// Generate the sequence for a validated query.
///
/// Position `n` (1-based) becomes `str1 + str2` when divisible by both
/// divisors, `str1` or `str2` when divisible by one of them, and its decimal
/// representation otherwise. Callers validate the query first, so both
/// divisors are positive.
pub(crate) fn generate(query: &FizzBuzzQuery) -> Vec<String> {
    (1..=query.limit.max(0))
        .map(|n| render(n, query))
        .collect()
}

fn render(n: i64, query: &FizzBuzzQuery) -> String {
    let by_first = n % query.first_divisor == 0;
    let by_second = n % query.second_divisor == 0;

    match (by_first, by_second) {
        (true, true) => format!("{}{}", query.first_string, query.second_string),
        (true, false) => query.first_string.clone(),
        (false, true) => query.second_string.clone(),
        (false, false) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_sequence() {
        let result = generate(&FizzBuzzQuery::new(3, 5, 15, "fizz", "buzz"));
        assert_eq!(
            result,
            vec![
                "1", "2", "fizz", "4", "buzz", "fizz", "7", "8", "fizz", "buzz", "11", "fizz",
                "13", "14", "fizzbuzz"
            ]
        );
    }

    #[test]
    fn test_same_divisors_concatenate() {
        let result = generate(&FizzBuzzQuery::new(3, 3, 6, "fizz", "buzz"));
        assert_eq!(result, vec!["1", "2", "fizzbuzz", "4", "5", "fizzbuzz"]);
    }

    #[test]
    fn test_divisor_one() {
        let result = generate(&FizzBuzzQuery::new(1, 7, 3, "a", "b"));
        assert_eq!(result, vec!["a", "a", "a"]);
    }

    #[test]
    fn test_length_matches_limit() {
        let result = generate(&FizzBuzzQuery::new(2, 7, 10_000, "foo", "bar"));
        assert_eq!(result.len(), 10_000);
        assert_eq!(result[13], "foobar");
    }
}
