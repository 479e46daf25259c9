pub mod ir;
pub mod lexical;
pub mod linearizer;
pub mod symtab;
