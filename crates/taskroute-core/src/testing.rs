//! テスト用のルーティング表

use crate::domain::ExchangeKind;
use crate::table::RouteTable;

/// 計算タスクと HTTP タスクを 2 つの exchange / 4 つの queue に振り分ける表
pub(crate) fn calc_table() -> RouteTable {
    RouteTable::builder()
        .exchange("alpha", ExchangeKind::Direct)
        .exchange("beta", ExchangeKind::Direct)
        .queue("default", "alpha", ["app.proc.tasks.add", "app.proc.tasks.sub"])
        .queue("another_1", "beta", ["app.proc.tasks.mul", "app.proc.tasks.div"])
        .queue("another_2", "beta", ["app.proc.tasks.modulo"])
        .queue(
            "another_3",
            "beta",
            [
                "app.io.tasks.get_data",
                "app.io.tasks.post_data",
                "app.io.tasks.put_data",
                "app.io.tasks.delete_data",
            ],
        )
        .default_queue("default")
        .build()
}

/// 最小の表: `{alpha: direct}`, `{default: alpha}`, `{default: [add, sub]}`.
pub(crate) fn single_queue_table() -> RouteTable {
    RouteTable::builder()
        .exchange("alpha", ExchangeKind::Direct)
        .queue("default", "alpha", ["add", "sub"])
        .build()
}
