mod direct;
mod form;
mod integrators;
mod rhs;
