//! src/call.rs
//!
//! Calling user functions with an assembled argument tuple.
//!
//! A stage function may take any number of positional parameters. The
//! binding layer builds the full argument list as one tuple (item fields and
//! bound extra arguments joined with [`Concat`]) and hands it to [`Call`],
//! which spreads the tuple over the function's parameters.
//!
//! Both traits are implemented for tuples up to the arities used by the
//! layouts: four elements on each side of a concatenation and eight
//! parameters for a call.

/// A function callable with the argument tuple `Args`.
///
/// Implemented for every `Fn` whose parameter list matches the tuple, so
/// `|a: i32, b: i32| a + b` is `Call<(i32, i32)>`.
///
/// Closures passed through this trait need explicit parameter types: the
/// compiler only infers closure signatures from `Fn` bounds.
pub trait Call<Args> {
    type Output;

    fn call_with(&self, args: Args) -> Self::Output;
}

macro_rules! impl_call {
    ($($ty:ident $var:ident)*) => {
        impl<Func, Ret, $($ty,)*> Call<($($ty,)*)> for Func
        where
            Func: Fn($($ty),*) -> Ret,
        {
            type Output = Ret;

            #[inline]
            fn call_with(&self, args: ($($ty,)*)) -> Ret {
                let ($($var,)*) = args;
                (self)($($var),*)
            }
        }
    };
}

impl_call!();
impl_call!(A0 a0);
impl_call!(A0 a0 A1 a1);
impl_call!(A0 a0 A1 a1 A2 a2);
impl_call!(A0 a0 A1 a1 A2 a2 A3 a3);
impl_call!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4);
impl_call!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4 A5 a5);
impl_call!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4 A5 a5 A6 a6);
impl_call!(A0 a0 A1 a1 A2 a2 A3 a3 A4 a4 A5 a5 A6 a6 A7 a7);

/// Tuple concatenation: `(a, b).concat((c,)) == (a, b, c)`.
pub trait Concat<Rhs> {
    type Output;

    fn concat(self, rhs: Rhs) -> Self::Output;
}

macro_rules! impl_concat {
    ([$($l:ident $lv:ident)*] [$($r:ident $rv:ident)*]) => {
        impl<$($l,)* $($r,)*> Concat<($($r,)*)> for ($($l,)*) {
            type Output = ($($l,)* $($r,)*);

            #[inline]
            #[allow(clippy::unused_unit)]
            fn concat(self, rhs: ($($r,)*)) -> Self::Output {
                let ($($lv,)*) = self;
                let ($($rv,)*) = rhs;
                ($($lv,)* $($rv,)*)
            }
        }
    };
}

macro_rules! impl_concat_rhs {
    ($lhs:tt) => {
        impl_concat!($lhs []);
        impl_concat!($lhs [R0 r0]);
        impl_concat!($lhs [R0 r0 R1 r1]);
        impl_concat!($lhs [R0 r0 R1 r1 R2 r2]);
        impl_concat!($lhs [R0 r0 R1 r1 R2 r2 R3 r3]);
    };
}

impl_concat_rhs!([]);
impl_concat_rhs!([L0 l0]);
impl_concat_rhs!([L0 l0 L1 l1]);
impl_concat_rhs!([L0 l0 L1 l1 L2 l2]);
impl_concat_rhs!([L0 l0 L1 l1 L2 l2 L3 l3]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_spreads_tuple() {
        let add = |a: i32, b: i32| a + b;
        assert_eq!(add.call_with((2, 3)), 5);

        let constant = || 7;
        assert_eq!(constant.call_with(()), 7);

        let join = |a: &str, b: char, c: u8| format!("{a}{b}{c}");
        assert_eq!(join.call_with(("x", '-', 1)), "x-1");
    }

    #[test]
    fn test_concat_preserves_order() {
        assert_eq!((1,).concat(("a", 2.5)), (1, "a", 2.5));
        assert_eq!(("a", 2.5).concat((1,)), ("a", 2.5, 1));
        assert_eq!(().concat((1, 2)), (1, 2));
        assert_eq!((1, 2).concat(()), (1, 2));
        assert_eq!((1, 2, 3, 4).concat((5, 6, 7, 8)), (1, 2, 3, 4, 5, 6, 7, 8));
    }
}
