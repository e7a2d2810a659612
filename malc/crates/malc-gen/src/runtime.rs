//! Module prologue: header, target, opaque runtime types, the GC
//! constructor, and the fixed runtime extern list.
//!
//! These strings are part of the ABI contract with the C runtime; the
//! linker and downstream tooling rely on them byte for byte.

pub const MODULE_HEADER: &str = "; ModuleID = 'malphas'\nsource_filename = \"malphas\"\n";

pub const TARGET: &str = "target datalayout = \"e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128\"\ntarget triple = \"x86_64-unknown-linux-gnu\"\n";

pub const OPAQUE_TYPES: &str = "\
%String = type opaque
%HashMap = type opaque
%Slice = type opaque
%Channel = type opaque
%Closure = type { i8* (i8*)*, i8* }
%struct.pthread_attr_t = type opaque
";

/// Registers `runtime_gc_init` to run before `main` at the lowest ctor
/// priority.
pub const GLOBAL_CTOR: &str = "\
@llvm.global_ctors = appending global [1 x { i32, void ()*, i8* }] [{ i32, void ()*, i8* } { i32 65535, void ()* @malphas_gc_init, i8* null }]

define internal void @malphas_gc_init() {
entry:
  call void @runtime_gc_init()
  ret void
}
";

/// Every runtime entry point emitted code may reference. `pthread_t` is
/// `i64` on the supported target.
pub const DECLARATIONS: &str = "\
declare void @runtime_gc_init()
declare i8* @runtime_alloc(i64)
declare %String* @runtime_string_new(i8*, i64)
declare %String* @runtime_string_concat(%String*, %String*)
declare i64 @runtime_string_len(%String*)
declare i8 @runtime_string_eq(%String*, %String*)
declare void @runtime_println_i8(i8)
declare void @runtime_println_i32(i32)
declare void @runtime_println_i64(i64)
declare void @runtime_println_double(double)
declare void @runtime_println_bool(i1)
declare void @runtime_println_string(%String*)
declare %Slice* @runtime_slice_new(i64, i64, i64)
declare i8* @runtime_slice_get(%Slice*, i64)
declare void @runtime_slice_set(%Slice*, i64, i8*)
declare i64 @runtime_slice_len(%Slice*)
declare void @runtime_slice_push(%Slice*, i8*)
declare void @runtime_slice_pop(%Slice*)
declare void @runtime_slice_insert(%Slice*, i64, i8*)
declare void @runtime_slice_remove(%Slice*, i64)
declare void @runtime_slice_clear(%Slice*)
declare void @runtime_slice_reserve(%Slice*, i64)
declare %Slice* @runtime_slice_copy(%Slice*)
declare %Slice* @runtime_slice_subslice(%Slice*, i64, i64)
declare %HashMap* @runtime_hashmap_new(i64, i64)
declare void @runtime_hashmap_set(%HashMap*, i8*, i8*)
declare i8* @runtime_hashmap_get(%HashMap*, i8*)
declare i8 @runtime_hashmap_contains(%HashMap*, i8*)
declare i64 @runtime_hashmap_len(%HashMap*)
declare %Channel* @runtime_channel_new(i64, i64)
declare void @runtime_channel_send(%Channel*, i8*)
declare void @runtime_channel_recv(%Channel*, i8*)
declare i8 @runtime_channel_try_send(%Channel*, i8*)
declare i8 @runtime_channel_try_recv(%Channel*, i8*)
declare void @runtime_legion_yield()
declare void @runtime_nanosleep(i64)
declare i32 @pthread_create(i64*, %struct.pthread_attr_t*, i8* (i8*)*, i8*)
declare i32 @pthread_join(i64, i8**)
declare void @pthread_exit(i8*)
";
