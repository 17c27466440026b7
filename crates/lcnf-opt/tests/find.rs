use lcnf::{
    builder::IrBuilder, check::check_decl, Alt, Arg, Cases, Code, CompilerCtx, Decl, FVarId,
    FunKind, LetValue, Name, Ty,
};
use lcnf_opt::find_join_points;
use test_ir::{find_fun, if_then_else, join_point, jumps_to, nat};


#[test]
fn tail_called_function_becomes_join_point() {
    //f x := fun g y := return y; let r := g x; return r
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let g = b.fvar();
    let y = b.param("y", nat());
    let yid = y.fvar;
    let g_decl = b.fun_decl(g, "g", vec![y], nat(), Code::Return(yid));
    let call = b.tail_call(g, [Arg::FVar(xid)], nat());
    let Code::Let(result, _) = &call else {
        panic!("unexpected call {call:?}");
    };
    let result = result.fvar;
    let decl = Decl::new(
        "f",
        vec![x],
        nat(),
        Code::fun_in(FunKind::Nonrec, vec![g_decl], call),
    );

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    assert!(ctx.lctx.contains(result));
    let (decl, report) = find_join_points(&mut ctx, decl).unwrap();
    assert!(!ctx.lctx.contains(result));

    assert_eq!(report.join_points.get(&g), Some(&1));
    assert_eq!(report.converted_calls, 1);
    let Code::Fun(group, k) = &decl.value else {
        panic!("expected a join group, got {:?}", decl.value);
    };
    assert_eq!(group.kind, FunKind::Join);
    assert!(group.decls[0].binder_name.as_str().starts_with("_jp."));
    assert_eq!(**k, Code::jmp(g, [Arg::FVar(xid)]));
    assert_eq!(ctx.get_fun_decl(g).unwrap().kind, FunKind::Join);
    assert_eq!(check_decl(&decl), Ok(()));
}

#[test]
fn non_tail_call_erases_candidate() {
    //f x := fun g y := return y; let a := g x; let s := Nat.succ a; return s
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let g = b.fvar();
    let y = b.param("y", nat());
    let yid = y.fvar;
    let g_decl = b.fun_decl(g, "g", vec![y], nat(), Code::Return(yid));
    let a = b.call("a", nat(), g, [Arg::FVar(xid)]);
    let aid = a.fvar;
    let s = b.const_app("s", nat(), "Nat.succ", [Arg::FVar(aid)]);
    let sid = s.fvar;
    let decl = Decl::new(
        "f",
        vec![x],
        nat(),
        Code::fun_in(
            FunKind::Nonrec,
            vec![g_decl],
            Code::let_in(a, Code::let_in(s, Code::Return(sid))),
        ),
    );

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl.clone()).unwrap();
    assert!(report.join_points.is_empty());
    assert_eq!(after, decl);
}

#[test]
fn first_class_use_and_arity_mismatch_erase() {
    //f x :=
    //  fun g y := return y
    //  fun h y := return y
    //  let p := Pair.mk g
    //  let r := h x x; return r
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let g = b.fvar();
    let y1 = b.param("y", nat());
    let y1id = y1.fvar;
    let g_decl = b.fun_decl(g, "g", vec![y1], nat(), Code::Return(y1id));
    let h = b.fvar();
    let y2 = b.param("y", nat());
    let y2id = y2.fvar;
    let h_decl = b.fun_decl(h, "h", vec![y2], nat(), Code::Return(y2id));
    let pair = b.const_app("p", Ty::Any, "Pair.mk", [Arg::FVar(g)]);
    let call = b.tail_call(h, [Arg::FVar(xid), Arg::FVar(xid)], nat());
    let decl = Decl::new(
        "f",
        vec![x],
        nat(),
        Code::fun_in(
            FunKind::Nonrec,
            vec![g_decl],
            Code::fun_in(FunKind::Nonrec, vec![h_decl], Code::let_in(pair, call)),
        ),
    );

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl.clone()).unwrap();
    assert!(report.join_points.is_empty());
    assert_eq!(after, decl);
}

///Builds
///```text
///f x :=
///  fun h a := return a
///  fun g c := let r1 := h c; return r1
///  <tail>
///```
/// where `tail` is built from `g`.
fn caller_callee(
    tail: impl FnOnce(&mut IrBuilder, FVarId, FVarId) -> Code,
) -> (Decl, FVarId, FVarId) {
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let h = b.fvar();
    let a = b.param("a", nat());
    let aid = a.fvar;
    let h_decl = b.fun_decl(h, "h", vec![a], nat(), Code::Return(aid));
    let g = b.fvar();
    let c = b.param("c", nat());
    let cid = c.fvar;
    let g_body = b.tail_call(h, [Arg::FVar(cid)], nat());
    let g_decl = b.fun_decl(g, "g", vec![c], nat(), g_body);
    let k = tail(&mut b, g, xid);
    let decl = Decl::new(
        "f",
        vec![x],
        nat(),
        Code::fun_in(
            FunKind::Nonrec,
            vec![h_decl],
            Code::fun_in(FunKind::Nonrec, vec![g_decl], k),
        ),
    );
    (decl, g, h)
}

#[test]
fn erasing_caller_erases_callee() {
    //g is called, but not in tail position. Its tail call to h can't become a jump then.
    let (decl, _g, _h) = caller_callee(|b, g, x| {
        let c = b.call("c", nat(), g, [Arg::FVar(x)]);
        let cid = c.fvar;
        let d = b.const_app("d", nat(), "Nat.succ", [Arg::FVar(cid)]);
        let did = d.fvar;
        Code::let_in(c, Code::let_in(d, Code::Return(did)))
    });

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl.clone()).unwrap();
    assert!(report.join_points.is_empty());
    assert_eq!(after, decl);
}

#[test]
fn caller_and_callee_both_become_join_points() {
    let (decl, g, h) = caller_callee(|b, g, x| b.tail_call(g, [Arg::FVar(x)], nat()));

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl).unwrap();
    assert_eq!(report.join_points.len(), 2);
    assert_eq!(report.converted_calls, 2);

    let g_jp = join_point(&after.value, g);
    let c = g_jp.params[0].fvar;
    assert_eq!(g_jp.value, Code::jmp(h, [Arg::FVar(c)]));
    join_point(&after.value, h);
    assert_eq!(check_decl(&after), Ok(()));
}

#[test]
fn recursive_group_becomes_join_group() {
    //f x :=
    //  fun loop n := cases n | Nat.zero => return n | Nat.succ m => let r := loop m; return r
    //  let r0 := loop x; return r0
    let mut b = IrBuilder::new();
    let x = b.param("x", nat());
    let xid = x.fvar;
    let lp = b.fvar();
    let n = b.param("n", nat());
    let nid = n.fvar;
    let m = b.param("m", nat());
    let mid = m.fvar;
    let recurse = b.tail_call(lp, [Arg::FVar(mid)], nat());
    let body = Code::cases(Cases {
        type_name: Name::from("Nat"),
        result_ty: nat(),
        discr: nid,
        alts: vec![
            Alt::Ctor {
                ctor: Name::from("Nat.zero"),
                params: vec![],
                code: Code::Return(nid),
            },
            Alt::Ctor {
                ctor: Name::from("Nat.succ"),
                params: vec![m],
                code: recurse,
            },
        ],
    });
    let lp_decl = b.fun_decl(lp, "loop", vec![n], nat(), body);
    let start = b.tail_call(lp, [Arg::FVar(xid)], nat());
    let decl = Decl::new(
        "f",
        vec![x],
        nat(),
        Code::fun_in(FunKind::Rec, vec![lp_decl], start),
    );

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl).unwrap();
    assert_eq!(report.join_points.get(&lp), Some(&1));
    let jp = join_point(&after.value, lp);
    assert_eq!(jumps_to(&jp.value, lp), vec![vec![Arg::FVar(mid)]]);
    assert_eq!(jumps_to(&after.value, lp).len(), 2);
    assert_eq!(check_decl(&after), Ok(()));

    //running again finds nothing new
    let (again, report) = find_join_points(&mut ctx, after.clone()).unwrap();
    assert!(report.join_points.is_empty());
    assert_eq!(again, after);
}

#[test]
fn returned_function_is_no_join_point() {
    //f c :=
    //  fun g y := return y
    //  cases c | true => let r := g c; return r | false => let h := g; return h
    let mut b = IrBuilder::new();
    let c = b.param("c", test_ir::bool_ty());
    let cid = c.fvar;
    let g = b.fvar();
    let y = b.param("y", test_ir::bool_ty());
    let yid = y.fvar;
    let g_decl = b.fun_decl(g, "g", vec![y], test_ir::bool_ty(), Code::Return(yid));
    let call = b.tail_call(g, [Arg::FVar(cid)], test_ir::bool_ty());
    let copy = b.let_decl(
        "h",
        Ty::Any,
        LetValue::FVar {
            fvar: g,
            args: Default::default(),
        },
    );
    let hid = copy.fvar;
    let decl = Decl::new(
        "f",
        vec![c],
        Ty::Any,
        Code::fun_in(
            FunKind::Nonrec,
            vec![g_decl],
            if_then_else(cid, Ty::Any, call, Code::let_in(copy, Code::Return(hid))),
        ),
    );

    let mut ctx = CompilerCtx::for_decl(&decl).unwrap();
    let (after, report) = find_join_points(&mut ctx, decl).unwrap();
    assert!(report.join_points.is_empty());
    assert_eq!(find_fun(&after.value, g).map(|(k, _)| k), Some(FunKind::Nonrec));
}
