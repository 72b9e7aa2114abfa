//! Parser Module
//!
//! calamineを使用したワークブック読み込みのアダプター。
//! テンプレート文書はセルグリッドとして、商品データはヘッダー付きの表として読み込みます。

mod workbook;

pub(crate) use workbook::WorkbookReader;
