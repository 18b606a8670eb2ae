//! End-to-end read/eval/print scenarios (spec §8).

mod common;
use common::run;

#[test]
fn arithmetic_variadic_addition() {
    assert_eq!(run("(+ 1 2 2)"), "5");
}

#[test]
fn arithmetic_nested() {
    assert_eq!(run("(* (+ 1 2) (- 10 6))"), "12");
}

#[test]
fn if_truthy_takes_then_branch() {
    assert_eq!(run("(if 1 'yes 'no)"), "yes");
}

#[test]
fn if_falsy_takes_else_branch() {
    assert_eq!(run("(if nil 'yes 'no)"), "no");
}

#[test]
fn if_missing_else_on_false_yields_nil() {
    assert_eq!(run("(if nil 'yes)"), "nil");
}

#[test]
fn nested_let_shadowing_is_lexical_to_its_own_body() {
    assert_eq!(run("(let ((x 1)) (+ x (let ((x 2)) x) x))"), "4");
}

#[test]
fn list_builds_a_proper_list_from_evaluated_elements() {
    assert_eq!(run("(list 1 (+ 1 1) 3)"), "(1 2 3)");
}

#[test]
fn cons_car_cdr_roundtrip() {
    assert_eq!(run("(car (cons 1 (cons 2 nil)))"), "1");
    assert_eq!(run("(cdr (cons 1 (cons 2 nil)))"), "(2)");
}

#[test]
fn car_and_cdr_of_nil_are_nil() {
    assert_eq!(run("(car '())"), "nil");
    assert_eq!(run("(cdr '())"), "nil");
}

#[test]
fn dotted_pair_prints_with_a_dot() {
    assert_eq!(run("(cons 1 2)"), "(1 . 2)");
}

#[test]
fn equal_on_numbers() {
    assert_eq!(run("(equal 3 3)"), "t");
    assert_eq!(run("(equal 3 4)"), "nil");
}

#[test]
fn equal_on_strings() {
    assert_eq!(run("(equal \"ab\" \"ab\")"), "t");
    assert_eq!(run("(equal \"ab\" \"ac\")"), "nil");
}

#[test]
fn equal_is_scalar_only_not_recursive_into_lists() {
    // spec §4.5: "equal" is limited to STRING/SYMBOL byte equality and NUM
    // integer equality; any other tag pairing, including two structurally
    // identical CONS chains, falls through to "otherwise false" rather
    // than walking into car/cdr.
    assert_eq!(run("(equal (list 1 2) (list 1 2))"), "nil");
    assert_eq!(run("(equal (list 1 2) (list 1 3))"), "nil");
}

#[test]
fn defun_then_call() {
    assert_eq!(run("(progn (defun square (n) (* n n)) (square 9))"), "81");
}

#[test]
fn recursive_defun() {
    let src = "(progn \
        (defun countdown (n) (if (equal n 0) 0 (countdown (- n 1)))) \
        (countdown 200))";
    assert_eq!(run(src), "0");
}

#[test]
fn lambda_is_first_class_and_applies_immediately() {
    assert_eq!(run("((lambda (x y) (+ x y)) 10 20)"), "30");
}

#[test]
fn set_mutates_a_let_binding_in_place() {
    assert_eq!(run("(let ((x 1)) (set x (+ x 41)) x)"), "42");
}

#[test]
fn set_shadows_rather_than_overwrites_the_prior_entry() {
    // spec §4.5: `set` adds a new entry to the front of the innermost
    // frame's names/values rather than searching for and mutating one
    // that already exists ("no rebinding semantics beyond shadowing by
    // list-front insertion"). Two `set`s of the same name therefore leave
    // two entries behind; lookup finds the most recent.
    assert_eq!(run("(let ((x 1)) (set x 2) (set x 3) x)"), "3");
}

#[test]
fn defun_inside_a_let_is_scoped_to_that_let() {
    // spec §9 Open Question, resolved by the spec's own text: `defun`
    // binds into the innermost frame just like `set` — it does not reach
    // into or create a binding in an outer (e.g. global) frame.
    assert_eq!(
        run("(let ((unused 0)) (defun local-fn (n) (* n 2)) (local-fn 5))"),
        "10"
    );
}

#[test]
#[should_panic(expected = "unbound symbol")]
fn defun_inside_a_let_does_not_leak_to_the_global_frame() {
    run("(progn (let ((unused 0)) (defun scoped-fn (n) n)) (scoped-fn 1))");
}

#[test]
fn quote_preserves_unevaluated_structure() {
    assert_eq!(run("'(a b (c d))"), "(a b (c d))");
}
