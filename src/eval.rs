//! The recursive evaluator (spec §4.5): tag dispatch, special forms,
//! primitives, and the lexical environment chain.
//!
//! [`Context`] plays the role `wudi-php-rs/src/vm/engine.rs`'s `Vm` struct
//! plays for that interpreter: it bundles the heap with whatever mutable
//! state evaluation needs (here, just the environment-chain root that
//! doubles as the GC root) and exposes the entry points the binary and the
//! reader call into.

use crate::core::{Handle, Heap, InlineStr, Mark, ObjRef, Payload};
use crate::fatal;
use crate::reader;

/// Bundles the heap with the live environment chain, which also serves as
/// the GC root passed to every `Heap::alloc` call (spec §4.1: "the
/// interpreter holds a single root, `env_top`").
pub struct Context {
    pub heap: Heap,
    pub env_top: ObjRef,
}

impl Context {
    pub fn new() -> Self {
        let mut ctx = Self {
            heap: Heap::new(),
            env_top: ObjRef::Nil,
        };
        ctx.env_top = ctx.initial_env();
        ctx
    }

    pub fn alloc(&mut self, payload: Payload) -> ObjRef {
        ObjRef::Slot(self.heap.alloc(payload, self.env_top))
    }

    fn sym(&mut self, name: &str) -> ObjRef {
        self.alloc(Payload::Symbol(InlineStr::new(name.as_bytes())))
    }

    fn cons(&mut self, car: ObjRef, cdr: ObjRef) -> ObjRef {
        self.alloc(Payload::Cons { car, cdr })
    }

    /// Builds the bootstrap frame binding `t`, `nil`, and the three
    /// arithmetic primitives by name (spec §4.5 "Initial environment").
    /// `+`/`-`/`*` are bound to themselves, the same trick used for `t`:
    /// looking a primitive up yields its own name symbol, and `apply`
    /// recognizes that symbol's text at the head of a combination before
    /// falling through to user-defined lambdas.
    fn initial_env(&mut self) -> ObjRef {
        let names = ["t", "nil", "+", "-", "*"];
        let mut name_list = ObjRef::Nil;
        let mut value_list = ObjRef::Nil;
        for n in names.iter().rev() {
            let sym = self.sym(n);
            let value = if *n == "nil" { ObjRef::Nil } else { sym };
            name_list = self.cons(sym, name_list);
            value_list = self.cons(value, value_list);
        }
        let frame = self.alloc(Payload::Env { names: name_list, values: value_list });
        self.cons(frame, ObjRef::Nil)
    }

    fn sym_bytes(&self, r: ObjRef) -> Option<&[u8]> {
        match r {
            ObjRef::Slot(h) => match self.heap.get(h).payload {
                Payload::Symbol(s) => Some(s.as_bytes()),
                _ => None,
            },
            ObjRef::Nil => None,
        }
    }

    fn sym_eq(&self, r: ObjRef, name: &str) -> bool {
        self.sym_bytes(r) == Some(name.as_bytes())
    }

    fn car(&self, r: ObjRef) -> ObjRef {
        match r {
            ObjRef::Slot(h) => match self.heap.get(h).payload {
                Payload::Cons { car, .. } => car,
                other => fatal!("car: expected a CONS, found {}", other.type_name()),
            },
            ObjRef::Nil => ObjRef::Nil,
        }
    }

    fn cdr(&self, r: ObjRef) -> ObjRef {
        match r {
            ObjRef::Slot(h) => match self.heap.get(h).payload {
                Payload::Cons { cdr, .. } => cdr,
                other => fatal!("cdr: expected a CONS, found {}", other.type_name()),
            },
            ObjRef::Nil => ObjRef::Nil,
        }
    }

    fn is_cons(&self, r: ObjRef) -> bool {
        matches!(r, ObjRef::Slot(h) if matches!(self.heap.get(h).payload, Payload::Cons { .. }))
    }

    /// NIL is the only false value; every other object, including `0` and
    /// `""`, is truthy (spec §4.5 "Truthiness").
    fn is_truthy(&self, r: ObjRef) -> bool {
        !matches!(r, ObjRef::Nil)
    }

    /// Deep-copy: allocates a fresh, structurally identical value so that
    /// mutating one copy (via `set`) can never reach through a shared cell
    /// into another binding's value (spec §4.5 "Symbol evaluation").
    fn deep_copy(&mut self, r: ObjRef) -> ObjRef {
        match r {
            ObjRef::Nil => ObjRef::Nil,
            ObjRef::Slot(h) => {
                let payload = self.heap.get(h).payload;
                match payload {
                    Payload::Num(n) => self.alloc(Payload::Num(n)),
                    Payload::Symbol(s) => self.alloc(Payload::Symbol(s)),
                    Payload::Str(s) => self.alloc(Payload::Str(s)),
                    Payload::Cons { car, cdr } => {
                        let car2 = self.deep_copy(car);
                        let cdr2 = self.deep_copy(cdr);
                        self.alloc(Payload::Cons { car: car2, cdr: cdr2 })
                    }
                    Payload::Quote(expr) => {
                        let expr2 = self.deep_copy(expr);
                        self.alloc(Payload::Quote(expr2))
                    }
                    Payload::Lambda { params, body } => {
                        let params2 = self.deep_copy(params);
                        let body2 = self.deep_copy(body);
                        self.alloc(Payload::Lambda { params: params2, body: body2 })
                    }
                    Payload::Env { .. } => fatal!("deep_copy: cannot copy an ENV frame"),
                    Payload::Free { .. } => fatal!("deep_copy: stale handle into a freed slot"),
                }
            }
        }
    }

    /// Spec §4.5 "equal" is deliberately narrower than full structural
    /// recursion ("structural equality limited to: same tag AND (for
    /// STRING/SYMBOL: byte equality; for NUM: integer equality; otherwise
    /// false)"): only the three scalar tags ever compare equal. Two CONS
    /// cells, two QUOTEs, two LAMBDAs, or NIL compared with itself all fall
    /// through to "otherwise false" — `equal` does not walk into car/cdr.
    fn equal(&self, a: ObjRef, b: ObjRef) -> bool {
        let (ObjRef::Slot(ha), ObjRef::Slot(hb)) = (a, b) else {
            return false;
        };
        let pa = self.heap.get(ha).payload;
        let pb = self.heap.get(hb).payload;
        match (pa, pb) {
            (Payload::Num(x), Payload::Num(y)) => x == y,
            (Payload::Symbol(x), Payload::Symbol(y)) => x.as_bytes() == y.as_bytes(),
            (Payload::Str(x), Payload::Str(y)) => x.as_bytes() == y.as_bytes(),
            _ => false,
        }
    }

    /// Walks the environment chain innermost-frame-first, returning a deep
    /// copy of the first binding whose name matches. Fatal if `name` is
    /// unbound anywhere in the chain (spec §4.5 "Symbol evaluation",
    /// §7.1).
    fn lookup(&mut self, name: &[u8]) -> ObjRef {
        let mut chain = self.env_top;
        while self.is_cons(chain) {
            let frame = self.car(chain);
            if let ObjRef::Slot(fh) = frame {
                let (mut names, mut values) = match self.heap.get(fh).payload {
                    Payload::Env { names, values } => (names, values),
                    _ => fatal!("lookup: environment chain contains a non-ENV frame"),
                };
                while self.is_cons(names) {
                    let n = self.car(names);
                    if self.sym_bytes(n) == Some(name) {
                        let value = self.car(values);
                        return self.deep_copy(value);
                    }
                    names = self.cdr(names);
                    values = self.cdr(values);
                }
            }
            chain = self.cdr(chain);
        }
        fatal!(
            "unbound symbol: {}",
            String::from_utf8_lossy(name)
        );
    }

    /// `set`/`defun`'s shared insertion rule (spec §4.5: "add (name, value)
    /// to the innermost frame"; §9 Open Question resolution: "both add to
    /// the innermost frame only — there is no process for updating an
    /// existing outer binding"). Always prepends, never searches for an
    /// existing entry to mutate: "no rebinding semantics beyond shadowing
    /// by list-front insertion" means a second `set` of the same name in
    /// the same frame adds a second, more-recent entry that lookup finds
    /// first, rather than overwriting the first.
    fn bind_innermost(&mut self, name_ref: ObjRef, value: ObjRef) {
        let frame = self.car(self.env_top);
        let ObjRef::Slot(fh) = frame else {
            fatal!("bind: environment chain has no innermost frame");
        };
        let (names, values) = match self.heap.get(fh).payload {
            Payload::Env { names, values } => (names, values),
            _ => fatal!("bind: innermost frame is not an ENV"),
        };
        let new_names = self.cons(name_ref, names);
        let new_values = self.cons(value, values);
        self.heap.get_mut(fh).payload = Payload::Env {
            names: new_names,
            values: new_values,
        };
    }

    /// Pushes a new frame in front of the chain, binding `names` to
    /// `values` pairwise (spec §4.5 "let"/"lambda application").
    fn extend_env(&mut self, names: ObjRef, values: ObjRef, chain: ObjRef) -> ObjRef {
        let frame = self.alloc(Payload::Env { names, values });
        self.cons(frame, chain)
    }

    /// Demotes a frame built by [`extend_env`] to UNUSED once its call
    /// returns, without touching the parent chain it was linked onto.
    /// `heap.mark(frame_chain, Unused)` would walk straight through the
    /// wrapper CONS's `cdr` into the caller's still-live environment, so
    /// this only follows the frame's own ENV record (its `names`/`values`
    /// trees), which this evaluator's deep-copy-on-bind discipline
    /// guarantees nothing else still points into.
    fn discard_frame(&mut self, frame_chain: ObjRef) {
        let ObjRef::Slot(wrapper) = frame_chain else {
            return;
        };
        let env_ref = self.car(frame_chain);
        self.heap.get_mut(wrapper).mark = Mark::Unused;
        self.heap.mark(env_ref, Mark::Unused);
    }

    fn collect_list(&self, mut list: ObjRef) -> Vec<ObjRef> {
        let mut out = Vec::new();
        while self.is_cons(list) {
            out.push(self.car(list));
            list = self.cdr(list);
        }
        out
    }

    fn build_list(&mut self, items: &[ObjRef]) -> ObjRef {
        let mut out = ObjRef::Nil;
        for item in items.iter().rev() {
            out = self.cons(*item, out);
        }
        out
    }

    fn eval_list(&mut self, mut list: ObjRef) -> Vec<ObjRef> {
        let mut out = Vec::new();
        while self.is_cons(list) {
            let head = self.car(list);
            out.push(self.eval(head));
            list = self.cdr(list);
        }
        out
    }

    fn as_num(&self, r: ObjRef) -> i64 {
        match r {
            ObjRef::Slot(h) => match self.heap.get(h).payload {
                Payload::Num(n) => n,
                other => fatal!("expected a number, found {}", other.type_name()),
            },
            ObjRef::Nil => fatal!("expected a number, found nil"),
        }
    }

    /// `eval(value, ctx) -> value`: the tag dispatch at the heart of
    /// spec §4.5. NUM/STRING self-evaluate, NIL evaluates to itself,
    /// SYMBOL looks itself up (deep-copying the bound value), QUOTE
    /// deep-copies its payload without evaluating it, and CONS is either
    /// a recognized special form or a procedure application.
    pub fn eval(&mut self, value: ObjRef) -> ObjRef {
        match value {
            ObjRef::Nil => ObjRef::Nil,
            ObjRef::Slot(h) => {
                let payload = self.heap.get(h).payload;
                match payload {
                    Payload::Num(_) | Payload::Str(_) => value,
                    Payload::Symbol(s) => {
                        let bytes = s.as_bytes().to_vec();
                        self.lookup(&bytes)
                    }
                    Payload::Quote(expr) => self.deep_copy(expr),
                    Payload::Cons { car, cdr } => self.eval_combination(car, cdr),
                    Payload::Lambda { .. } => value,
                    Payload::Env { .. } => fatal!("eval: an ENV frame is not a valid expression"),
                    Payload::Free { .. } => fatal!("eval: stale handle into a freed slot"),
                }
            }
        }
    }

    fn eval_combination(&mut self, head: ObjRef, rest: ObjRef) -> ObjRef {
        if self.sym_eq(head, "quote") {
            return self.deep_copy(self.car(rest));
        }
        if self.sym_eq(head, "if") {
            return self.eval_if(rest);
        }
        if self.sym_eq(head, "list") {
            let items = self.eval_list(rest);
            return self.build_list(&items);
        }
        if self.sym_eq(head, "let") {
            return self.eval_let(rest);
        }
        if self.sym_eq(head, "set") {
            return self.eval_set(rest);
        }
        if self.sym_eq(head, "lambda") {
            // spec §4.5: "deep-copy params and body; wrap in a LAMBDA
            // value" — without this, an inline `(lambda ...)` literal's
            // LAMBDA would alias the read AST it was parsed from, and
            // marking the operator UNUSED after application (below) would
            // reclaim nodes the caller's own source form still points to.
            let params = self.deep_copy(self.car(rest));
            let body = self.deep_copy(self.car(self.cdr(rest)));
            return self.alloc(Payload::Lambda { params, body });
        }
        if self.sym_eq(head, "defun") {
            return self.eval_defun(rest);
        }
        if self.sym_eq(head, "progn") {
            return self.eval_progn(rest);
        }
        if self.sym_eq(head, "cons") {
            let a = self.eval(self.car(rest));
            let b = self.eval(self.car(self.cdr(rest)));
            return self.cons(a, b);
        }
        if self.sym_eq(head, "car") {
            let v = self.eval(self.car(rest));
            return self.car_and_reclaim(v);
        }
        if self.sym_eq(head, "cdr") {
            let v = self.eval(self.car(rest));
            return self.cdr_and_reclaim(v);
        }
        if self.sym_eq(head, "equal") {
            let a = self.eval(self.car(rest));
            let b = self.eval(self.car(self.cdr(rest)));
            let result = if self.equal(a, b) { self.truth() } else { ObjRef::Nil };
            self.heap.mark(a, Mark::Unused);
            self.heap.mark(b, Mark::Unused);
            return result;
        }
        if self.sym_eq(head, "load") {
            return self.eval_load(rest);
        }
        if self.sym_eq(head, "+") || self.sym_eq(head, "-") || self.sym_eq(head, "*") {
            let op = self.sym_bytes(head).map(|b| b[0]).unwrap_or(b'+');
            let args = self.eval_list(rest);
            return self.arith(op, &args);
        }
        // Not a recognized special form: evaluate `head` and, if it
        // names a lambda, apply it to the evaluated arguments.
        let callee = self.eval(head);
        let args = self.eval_list(rest);
        let result = self.apply(callee, &args);
        self.heap.mark(callee, Mark::Unused);
        let arg_list = self.build_list(&args);
        self.heap.mark(arg_list, Mark::Unused);
        result
    }

    /// `car e` (spec §4.5): returns `e`'s car, then splices NIL into `e`'s
    /// own car slot and marks `e` UNUSED so the now-car-less spine (the
    /// cdr chain, and whatever else `e` alone reached) is swept without
    /// touching the returned head, which `e` no longer points to (spec §3
    /// Lifecycle: one of only two in-place-mutation sites besides `cdr`).
    fn car_and_reclaim(&mut self, e: ObjRef) -> ObjRef {
        let ObjRef::Slot(h) = e else {
            return ObjRef::Nil;
        };
        let (car, cdr) = match self.heap.get(h).payload {
            Payload::Cons { car, cdr } => (car, cdr),
            other => fatal!("car: expected a CONS, found {}", other.type_name()),
        };
        self.heap.get_mut(h).payload = Payload::Cons {
            car: ObjRef::Nil,
            cdr,
        };
        self.heap.mark(e, Mark::Unused);
        car
    }

    /// `cdr e`: symmetric to [`car_and_reclaim`] — splices NIL into `e`'s
    /// cdr slot instead, so marking `e` UNUSED reclaims the car (no longer
    /// reachable from the returned cdr) rather than the spine.
    fn cdr_and_reclaim(&mut self, e: ObjRef) -> ObjRef {
        let ObjRef::Slot(h) = e else {
            return ObjRef::Nil;
        };
        let (car, cdr) = match self.heap.get(h).payload {
            Payload::Cons { car, cdr } => (car, cdr),
            other => fatal!("cdr: expected a CONS, found {}", other.type_name()),
        };
        self.heap.get_mut(h).payload = Payload::Cons {
            car,
            cdr: ObjRef::Nil,
        };
        self.heap.mark(e, Mark::Unused);
        cdr
    }

    fn truth(&mut self) -> ObjRef {
        self.sym("t")
    }

    fn eval_if(&mut self, rest: ObjRef) -> ObjRef {
        let cond = self.car(rest);
        let then_branch = self.car(self.cdr(rest));
        let else_clause = self.cdr(self.cdr(rest));
        let test = self.eval(cond);
        let result = if self.is_truthy(test) {
            self.eval(then_branch)
        } else if self.is_cons(else_clause) {
            self.eval(self.car(else_clause))
        } else {
            ObjRef::Nil
        };
        // spec §4.5: "The predicate's evaluated value is marked UNUSED
        // before returning."
        self.heap.mark(test, Mark::Unused);
        result
    }

    /// `(let ((name expr) ...) body...)`: evaluates each binding's
    /// initializer in the *enclosing* environment (no forward reference
    /// between bindings), pushes one new frame holding all of them, then
    /// evaluates the body as an implicit `progn`. Pops the frame by
    /// demoting it to UNUSED before returning (spec §4.5 "let").
    fn eval_let(&mut self, rest: ObjRef) -> ObjRef {
        let bindings = self.car(rest);
        let body = self.cdr(rest);
        let pairs = self.collect_list(bindings);
        let mut names = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for pair in pairs {
            names.push(self.car(pair));
            let init = self.car(self.cdr(pair));
            values.push(self.eval(init));
        }
        let name_list = self.build_list(&names);
        let value_list = self.build_list(&values);
        let saved = self.env_top;
        self.env_top = self.extend_env(name_list, value_list, saved);
        let result = self.eval_progn(body);
        let frame = self.env_top;
        self.env_top = saved;
        self.discard_frame(frame);
        result
    }

    fn eval_set(&mut self, rest: ObjRef) -> ObjRef {
        let name_ref = self.car(rest);
        if self.sym_bytes(name_ref).is_none() {
            fatal!("set: first argument must be a symbol");
        }
        let value = self.eval(self.car(self.cdr(rest)));
        self.bind_innermost(name_ref, value);
        value
    }

    /// `(defun name (params...) body)`: equivalent to
    /// `(set name (lambda (params...) body))` (spec §4.5 "defun") — binds
    /// into the innermost frame the same way `set` does, and returns the
    /// value just bound.
    fn eval_defun(&mut self, rest: ObjRef) -> ObjRef {
        let name_ref = self.car(rest);
        if self.sym_bytes(name_ref).is_none() {
            fatal!("defun: first argument must be a symbol");
        }
        // spec §4.5: "defun ... — equivalent to (set name (lambda (params…)
        // body…))", so it deep-copies params/body exactly as the `lambda`
        // special form does.
        let params = self.deep_copy(self.car(self.cdr(rest)));
        let body = self.deep_copy(self.car(self.cdr(self.cdr(rest))));
        let lambda = self.alloc(Payload::Lambda { params, body });
        self.bind_innermost(name_ref, lambda);
        lambda
    }

    fn eval_progn(&mut self, mut body: ObjRef) -> ObjRef {
        let mut result = ObjRef::Nil;
        while self.is_cons(body) {
            result = self.eval(self.car(body));
            body = self.cdr(body);
        }
        result
    }

    /// Applies `callee` to already-evaluated `args`. Lambdas are not
    /// closures over their definition-time environment — [`Payload::Lambda`]
    /// carries only `params`/`body`, so the call frame chains onto the
    /// *caller's* live environment instead of a captured one (an explicit
    /// divergence from lexical-closure Scheme, recorded as an open
    /// question resolution: this interpreter's lambdas see the dynamic
    /// environment of their call site, plus whatever `defun` has bound
    /// globally).
    fn apply(&mut self, callee: ObjRef, args: &[ObjRef]) -> ObjRef {
        let ObjRef::Slot(h) = callee else {
            fatal!("apply: nil is not callable");
        };
        let (params, body) = match self.heap.get(h).payload {
            Payload::Lambda { params, body } => (params, body),
            other => fatal!("apply: cannot call a {}", other.type_name()),
        };
        let param_list = self.collect_list(params);
        if param_list.len() != args.len() {
            fatal!(
                "apply: arity mismatch, expected {} arguments, got {}",
                param_list.len(),
                args.len()
            );
        }
        let name_list = self.build_list(&param_list);
        let value_list = self.build_list(args);
        let saved = self.env_top;
        self.env_top = self.extend_env(name_list, value_list, saved);
        let result = self.eval(body);
        let frame = self.env_top;
        self.env_top = saved;
        self.discard_frame(frame);
        result
    }

    fn arith(&mut self, op: u8, args: &[ObjRef]) -> ObjRef {
        if args.is_empty() {
            fatal!("arithmetic primitive called with no arguments");
        }
        let nums: Vec<i64> = args.iter().map(|a| self.as_num(*a)).collect();
        let result = match op {
            b'+' => nums.iter().sum(),
            b'*' => nums.iter().product(),
            b'-' if nums.len() == 1 => -nums[0],
            b'-' => nums[1..].iter().fold(nums[0], |acc, n| acc - n),
            _ => unreachable!("arith: unrecognized operator byte {}", op),
        };
        self.alloc(Payload::Num(result))
    }

    /// `(load "path")`: read one top-level form from the named file and
    /// evaluate it (spec §6). Fatal if the file can't be read — the
    /// REPL's own startup prelude load softens this at the CLI layer by
    /// catching the panic there, but the primitive itself always aborts
    /// on a missing file.
    fn eval_load(&mut self, rest: ObjRef) -> ObjRef {
        let path_ref = self.eval(self.car(rest));
        let ObjRef::Slot(h) = path_ref else {
            fatal!("load: expected a string path");
        };
        let path = match self.heap.get(h).payload {
            Payload::Str(s) => String::from_utf8_lossy(s.as_bytes()).into_owned(),
            other => fatal!("load: expected a string path, found {}", other.type_name()),
        };
        let form = reader::read_file(&path, self);
        self.eval(form)
    }

    /// Debug/inspection helper for tests: repaints everything reachable
    /// from `env_top` EXTERNAL (so marks are in a known state for
    /// inspection) and returns the heap's current live, i.e. not-yet-freed,
    /// slot count.
    pub fn live_from_root(&mut self) -> usize {
        self.heap.mark(self.env_top, Mark::External);
        self.heap.live_count()
    }

    /// Releases a top-level result once the caller (the REPL, `run_file`,
    /// or a test loop) is done with it, the same way [`discard_frame`]
    /// releases a call frame: without this, a value nothing ever binds
    /// into the environment would stay marked INTERNAL forever, since
    /// `unmark` preserves INTERNAL slots across every future collection —
    /// "survives an unmark phase" protects a value mid-construction, not
    /// a value whose owner has simply moved on (spec §8 P6: repeated
    /// evaluation must not grow the live set without bound).
    pub fn discard(&mut self, value: ObjRef) {
        self.heap.mark(value, Mark::Unused);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level convenience matching the other driver functions in
/// [`crate::reader`]/[`crate::printer`]: `eval(value, ctx) -> value`.
pub fn eval(value: ObjRef, ctx: &mut Context) -> ObjRef {
    ctx.eval(value)
}

#[allow(dead_code)]
fn handle_of(r: ObjRef) -> Option<Handle> {
    match r {
        ObjRef::Nil => None,
        ObjRef::Slot(h) => Some(h),
    }
}
