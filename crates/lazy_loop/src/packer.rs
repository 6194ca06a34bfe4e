//! src/packer.rs
//!
//! Result packing: what a loop yields for each surviving item.
//!
//! Three fields can be reported per item: the enumeration index (position in
//! the source, dropped items included), the original input and the final
//! output. The combination is picked once, before iteration, either as one
//! of eight zero-sized shapes that pack into plain tuples, or as a runtime
//! [`ReturnShape`] that packs into the [`Packed`] enum.
//!
//! | enumerations | inputs | outputs | shape                 | yields                  |
//! |--------------|--------|---------|-----------------------|-------------------------|
//! | F            | F      | F       | `Nothing`             | `()`                    |
//! | F            | F      | T       | `Outputs` (default)   | `output`                |
//! | F            | T      | F       | `Inputs`              | `input`                 |
//! | F            | T      | T       | `InputsOutputs`       | `(input, output)`       |
//! | T            | F      | F       | `Enumerations`        | `index`                 |
//! | T            | F      | T       | `EnumerationsOutputs` | `(index, output)`       |
//! | T            | T      | F       | `EnumerationsInputs`  | `(index, input)`        |
//! | T            | T      | T       | `All`                 | `(index, input, output)`|

/// Packs `(index, input, output)` into the value a loop yields.
///
/// `Kept` is what the engine retains of each input until the output is
/// ready: the input itself for shapes that report it, `()` otherwise. This
/// keeps shapes without inputs free of any `Clone` requirement.
pub trait Packer<I, O> {
    type Kept;
    type Packed;

    fn retain(&self, input: &I) -> Self::Kept;

    fn pack(&self, index: usize, kept: Self::Kept, output: O) -> Self::Packed;
}

macro_rules! shape {
    ($(#[$doc:meta])* $name:ident, |$index:ident, $input:ident, $output:ident| -> $packed:ty = $body:expr, without_input) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl<I, O> Packer<I, O> for $name {
            type Kept = ();
            type Packed = $packed;

            #[inline]
            fn retain(&self, _input: &I) {}

            #[inline]
            #[allow(unused_variables)]
            fn pack(&self, $index: usize, _kept: (), $output: O) -> $packed {
                $body
            }
        }
    };
    ($(#[$doc:meta])* $name:ident, |$index:ident, $input:ident, $output:ident| -> $packed:ty = $body:expr, with_input) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl<I: Clone, O> Packer<I, O> for $name {
            type Kept = I;
            type Packed = $packed;

            #[inline]
            fn retain(&self, input: &I) -> I {
                input.clone()
            }

            #[inline]
            #[allow(unused_variables)]
            fn pack(&self, $index: usize, $input: I, $output: O) -> $packed {
                $body
            }
        }
    };
}

shape!(
    /// Yields `()` for every surviving item.
    Nothing, |index, input, output| -> () = (), without_input
);
shape!(
    /// Yields the final output. The default.
    Outputs, |index, input, output| -> O = output, without_input
);
shape!(Inputs, |index, input, output| -> I = input, with_input);
shape!(InputsOutputs, |index, input, output| -> (I, O) = (input, output), with_input);
shape!(Enumerations, |index, input, output| -> usize = index, without_input);
shape!(EnumerationsOutputs, |index, input, output| -> (usize, O) = (index, output), without_input);
shape!(EnumerationsInputs, |index, input, output| -> (usize, I) = (index, input), with_input);
shape!(
    /// Yields `(index, input, output)`.
    All, |index, input, output| -> (usize, I, O) = (index, input, output), with_input
);

/// Runtime selection of the return shape from three flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnShape {
    pub enumerations: bool,
    pub inputs: bool,
    pub outputs: bool,
}

impl Default for ReturnShape {
    fn default() -> Self {
        Self {
            enumerations: false,
            inputs: false,
            outputs: true,
        }
    }
}

impl ReturnShape {
    pub fn new(enumerations: bool, inputs: bool, outputs: bool) -> Self {
        Self {
            enumerations,
            inputs,
            outputs,
        }
    }
}

/// Value yielded under a runtime [`ReturnShape`]; one variant per shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packed<I, O> {
    Unit,
    Output(O),
    Input(I),
    InputOutput(I, O),
    Index(usize),
    IndexOutput(usize, O),
    IndexInput(usize, I),
    All(usize, I, O),
}

impl<I: Clone, O> Packer<I, O> for ReturnShape {
    type Kept = Option<I>;
    type Packed = Packed<I, O>;

    fn retain(&self, input: &I) -> Option<I> {
        self.inputs.then(|| input.clone())
    }

    fn pack(&self, index: usize, kept: Option<I>, output: O) -> Packed<I, O> {
        match (self.enumerations, kept, self.outputs) {
            (false, None, false) => Packed::Unit,
            (false, None, true) => Packed::Output(output),
            (false, Some(input), false) => Packed::Input(input),
            (false, Some(input), true) => Packed::InputOutput(input, output),
            (true, None, false) => Packed::Index(index),
            (true, None, true) => Packed::IndexOutput(index, output),
            (true, Some(input), false) => Packed::IndexInput(index, input),
            (true, Some(input), true) => Packed::All(index, input, output),
        }
    }
}
