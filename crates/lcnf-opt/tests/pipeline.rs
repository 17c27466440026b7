use lcnf::{builder::IrBuilder, check::check_decl, Arg, Code, Decl, FVarId, FunKind, LetValue, Name};
use lcnf_opt::{Config, OptError, Optimizer, ReduceMode};
use test_ir::{bool_ty, if_then_else, init_logger, join_point, jumps_to, nat};


///```text
///f x c :=
///  let y := Nat.succ x
///  fun g n := let s := Nat.add y n; return s
///  cases c | true => let r1 := g x; return r1 | false => let r2 := g y; return r2
///```
fn branching_tail_calls() -> (Decl, FVarId, FVarId, FVarId) {
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let c = b.param("c", bool_ty());
    let cid = c.fvar;
    let y = b.const_app("y", nat(), "Nat.succ", [Arg::FVar(xid)]);
    let yid = y.fvar;
    let g = b.fvar();
    let n = b.param("n", nat());
    let nid = n.fvar;
    let s = b.const_app("s", nat(), "Nat.add", [Arg::FVar(yid), Arg::FVar(nid)]);
    let sid = s.fvar;
    let g_decl = b.fun_decl(g, "g", vec![n], nat(), Code::let_in(s, Code::Return(sid)));
    let on_true = b.tail_call(g, [Arg::FVar(xid)], nat());
    let on_false = b.tail_call(g, [Arg::FVar(yid)], nat());
    let decl = Decl::new(
        "f",
        vec![x, c],
        nat(),
        Code::let_in(
            y,
            Code::fun_in(
                FunKind::Nonrec,
                vec![g_decl],
                if_then_else(cid, nat(), on_true, on_false),
            ),
        ),
    );
    (decl, g, xid, yid)
}

fn verifying() -> Config {
    Config {
        verify: true,
        ..Default::default()
    }
}

#[test]
fn full_pipeline() {
    init_logger();
    let (decl, g, x, y) = branching_tail_calls();
    let optimizer = Optimizer::new(verifying());
    let (after, report) = optimizer.run_decl_with_report(decl).unwrap();

    assert!(!report.downgraded);
    assert_eq!(report.find.as_ref().map(|r| r.join_points.len()), Some(1));
    //`y` is captured first, and then removed again, since every jump passes `y`
    assert_eq!(report.extend.as_ref().map(|r| r.added_params()), Some(1));
    assert_eq!(
        report.common_args.as_ref().map(|r| r.removed_params()),
        Some(1)
    );

    let jp = join_point(&after.value, g);
    assert_eq!(jp.params.len(), 1);
    let Code::Let(s, _) = &jp.value else {
        panic!("unexpected body {:?}", jp.value);
    };
    let LetValue::Const { args, .. } = &s.value else {
        panic!("unexpected value {:?}", s.value);
    };
    assert_eq!(args[0], Arg::FVar(y));
    assert_eq!(
        jumps_to(&after.value, g),
        vec![vec![Arg::FVar(x)], vec![Arg::FVar(y)]]
    );
    assert_eq!(check_decl(&after), Ok(()));

    //optimizing again is a no-op
    let again = optimizer.run_decl(after.clone()).unwrap();
    assert_eq!(again, after);
}

#[test]
fn extend_only_closes_join_points() {
    let (decl, g, x, y) = branching_tail_calls();
    let mut config = verifying();
    config.common_args.pass.enabled = false;
    let after = Optimizer::new(config).run_decl(decl).unwrap();

    assert_eq!(join_point(&after.value, g).params.len(), 2);
    assert_eq!(
        jumps_to(&after.value, g),
        vec![
            vec![Arg::FVar(x), Arg::FVar(y)],
            vec![Arg::FVar(y), Arg::FVar(y)]
        ]
    );
    test_ir::assert_closed_join_points(&after);
}

#[test]
fn disabled_passes_keep_declaration() {
    let (decl, ..) = branching_tail_calls();
    let (after, report) = Optimizer::new(Config::none())
        .run_decl_with_report(decl.clone())
        .unwrap();
    assert_eq!(after, decl);
    assert!(report.find.is_none() && report.extend.is_none() && report.common_args.is_none());
}

///`f x := jmp ? x`, where the jump target is not declared anywhere.
fn dangling_jump() -> Decl {
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let nowhere = b.fvar();
    Decl::new("broken", vec![x], nat(), Code::jmp(nowhere, [Arg::FVar(xid)]))
}

#[test]
fn internal_error_keeps_declaration_unoptimized() {
    let decl = dangling_jump();
    let (after, report) = Optimizer::new(Config::default())
        .run_decl_with_report(decl.clone())
        .unwrap();
    assert!(report.downgraded);
    assert_eq!(after, decl);
}

#[test]
fn internal_error_aborts_if_requested() {
    let config = Config {
        abort_on_internal_error: true,
        ..Default::default()
    };
    let err = Optimizer::new(config).run_decl(dangling_jump()).unwrap_err();
    assert!(err.is_internal());
    assert!(matches!(err, OptError::Internal { .. }));
}

#[test]
fn malformed_input_is_rejected() {
    let err = Optimizer::new(verifying())
        .run_decl(dangling_jump())
        .unwrap_err();
    assert!(!err.is_internal());
    assert!(matches!(err, OptError::InvalidInput { ref decl, .. } if *decl == Name::from("broken")));
}

#[test]
fn declarations_are_optimized_in_parallel_and_keep_order() {
    let mut decls = Vec::new();
    for _ in 0..16 {
        decls.push(branching_tail_calls().0);
        decls.push(dangling_jump());
    }
    let config = Config {
        common_args: lcnf_opt::CommonArgsConfig {
            mode: ReduceMode::Fixpoint { max_iterations: 4 },
            ..Default::default()
        },
        ..Default::default()
    };
    let optimized = Optimizer::new(config).optimize_decls(decls.clone()).unwrap();

    assert_eq!(optimized.len(), decls.len());
    for (before, after) in decls.iter().zip(&optimized) {
        assert_eq!(before.name, after.name);
        if after.name == Name::from("broken") {
            assert_eq!(before, after);
        } else {
            assert_ne!(before, after);
        }
    }
}
