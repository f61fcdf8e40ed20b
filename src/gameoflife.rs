//! 데모용 Game of Life Step 정의.

use rust_behave::steps::params::INT;
use rust_behave::steps::{step_fn, LifecycleHook, StepDefinition, StepProvider};
use std::collections::BTreeSet;

/// 살아 있는 셀 집합으로 표현한 격자이다. (0, 0)은 왼쪽 위이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    width: usize,
    height: usize,
    live: BTreeSet<(usize, usize)>,
}

impl Game {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            live: BTreeSet::new(),
        }
    }

    /// 셀 상태를 뒤집는다.
    pub fn toggle(&mut self, column: usize, row: usize) -> anyhow::Result<()> {
        if column >= self.width || row >= self.height {
            anyhow::bail!(
                "({column}, {row})는 {}x{} 격자 밖입니다.",
                self.width,
                self.height
            );
        }
        if !self.live.remove(&(column, row)) {
            self.live.insert((column, row));
        }
        Ok(())
    }

    /// 다음 세대로 진행한다.
    pub fn tick(&mut self) {
        let mut next = BTreeSet::new();
        for row in 0..self.height {
            for column in 0..self.width {
                let neighbours = self.neighbours(column, row);
                let alive = self.live.contains(&(column, row));
                if neighbours == 3 || (alive && neighbours == 2) {
                    next.insert((column, row));
                }
            }
        }
        self.live = next;
    }

    fn neighbours(&self, column: usize, row: usize) -> usize {
        let mut count = 0;
        for dy in [-1isize, 0, 1] {
            for dx in [-1isize, 0, 1] {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (Some(x), Some(y)) = (column.checked_add_signed(dx), row.checked_add_signed(dy)) else {
                    continue;
                };
                if self.live.contains(&(x, y)) {
                    count += 1;
                }
            }
        }
        count
    }

    /// 살아 있는 셀은 `X`, 죽은 셀은 `.`로 그린다.
    pub fn render(&self) -> String {
        (0..self.height)
            .map(|row| {
                (0..self.width)
                    .map(|column| if self.live.contains(&(column, row)) { 'X' } else { '.' })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Story에 적힌 격자를 행 단위로 정리한다. 공백으로 구분된 각 덩어리가 한 행이다.
fn normalise_grid(grid: &str) -> String {
    grid.split_whitespace().collect::<Vec<_>>().join("\n")
}

/// Game of Life Step 제공자이다.
pub struct GameSteps;

impl StepProvider for GameSteps {
    fn candidates(&self) -> Vec<StepDefinition> {
        vec![
            StepDefinition::given(
                "a $width by $height game",
                step_fn(|ctx, args| {
                    ctx.insert_fixture(Game::new(args.get("width")?, args.get("height")?));
                    Ok(())
                }),
            )
            .param("width", INT)
            .param("height", INT)
            .alias("a new game: $width by $height"),
            StepDefinition::given("a vertical blinker in column $column", step_fn(|_, _| Ok(())))
                .composed_of([
                    "Given a 5 by 5 game",
                    "When I toggle the cell at (<column>, 1)",
                    "And I toggle the cell at (<column>, 2)",
                    "And I toggle the cell at (<column>, 3)",
                ]),
            StepDefinition::when(
                "I toggle the cell at ($column, $row)",
                step_fn(|ctx, args| {
                    ctx.require_fixture_mut::<Game>()?
                        .toggle(args.get("column")?, args.get("row")?)
                }),
            )
            .param("column", INT)
            .param("row", INT),
            StepDefinition::when(
                "the game ticks",
                step_fn(|ctx, _| {
                    ctx.require_fixture_mut::<Game>()?.tick();
                    Ok(())
                }),
            ),
            StepDefinition::then(
                "the grid should look like $grid",
                step_fn(|ctx, args| {
                    let expected = normalise_grid(&args.get::<String>("grid")?);
                    let actual = ctx.require_fixture_mut::<Game>()?.render();
                    anyhow::ensure!(
                        actual == expected,
                        "격자가 다릅니다.\n기대:\n{expected}\n실제:\n{actual}"
                    );
                    Ok(())
                }),
            )
            .alias("the grid should be $grid"),
        ]
    }

    fn hooks(&self) -> Vec<LifecycleHook> {
        vec![LifecycleHook::after_scenario(
            "discard game",
            step_fn(|ctx, _| {
                ctx.take_fixture::<Game>();
                Ok(())
            }),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blinker_oscillates() {
        let mut game = Game::new(5, 5);
        for row in 1..=3 {
            game.toggle(2, row).expect("토글 실패");
        }
        game.tick();
        assert_eq!(game.render(), ".....\n.....\n.XXX.\n.....\n.....");
        game.tick();
        assert_eq!(game.render(), ".....\n..X..\n..X..\n..X..\n.....");
    }

    #[test]
    fn toggle_twice_restores_cell_and_rejects_out_of_bounds() {
        let mut game = Game::new(2, 2);
        game.toggle(1, 0).expect("토글 실패");
        game.toggle(1, 0).expect("토글 실패");
        assert_eq!(game.render(), "..\n..");
        assert!(game.toggle(2, 0).is_err());
    }

    #[test]
    fn vertical_blinker_is_a_composite_of_existing_steps() {
        let mut registry = rust_behave::CandidateRegistry::new();
        registry.register_provider(&GameSteps).expect("등록 실패");
        let blinker = registry
            .all_candidates()
            .iter()
            .find(|candidate| candidate.pattern().as_str() == "a vertical blinker in column $column")
            .expect("blinker 후보 없음");
        assert_eq!(blinker.composed_steps().len(), 4);
        assert_eq!(blinker.composed_steps()[0], "Given a 5 by 5 game");
    }

    #[test]
    fn grid_text_is_normalised() {
        assert_eq!(normalise_grid("\n  ..X\n  .X.\n\n"), "..X\n.X.");
        assert_eq!(normalise_grid("..X  .X."), "..X\n.X.");
    }
}
