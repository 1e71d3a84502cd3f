use super::*;

#[test]
fn test_span_basics() {
    let span = Span::new(10, 20);
    assert_eq!(span.start, 10);
    assert_eq!(span.end, 20);
    assert_eq!(span.len(), 10);
    assert!(!span.is_empty());
}

#[test]
fn test_span_contains() {
    let span = Span::new(10, 20);
    assert!(span.contains(10));
    assert!(span.contains(19));
    assert!(!span.contains(9));
    assert!(!span.contains(20));
}

#[test]
fn test_span_contains_span() {
    let outer = Span::new(10, 30);
    let inner = Span::new(15, 25);
    let partial = Span::new(5, 20);

    assert!(outer.contains_span(inner));
    assert!(!outer.contains_span(partial));
    assert!(outer.contains_span(outer));
}

#[test]
fn test_span_overlaps() {
    let a = Span::new(10, 20);
    let b = Span::new(15, 25);
    let c = Span::new(20, 30);

    assert!(a.overlaps(b));
    assert!(b.overlaps(a));
    assert!(!a.overlaps(c)); // Adjacent, not overlapping
}

#[test]
fn test_span_merge() {
    let a = Span::new(10, 20);
    let b = Span::new(15, 30);
    assert_eq!(a.merge(b), Span::new(10, 30));
    assert_eq!(b.merge(a), Span::new(10, 30));
}

#[test]
fn test_span_slice() {
    let text = "var x = 1;";
    assert_eq!(Span::new(4, 5).slice(text), "x");
    assert_eq!(Span::new(0, 3).slice(text), "var");
    // Out-of-bounds spans slice to empty rather than panicking.
    assert_eq!(Span::new(8, 99).slice(text), "");
}

#[test]
fn test_dummy_span() {
    let span = Span::dummy();
    assert!(span.is_dummy());
    assert!(!Span::new(0, 0).is_dummy());
}
